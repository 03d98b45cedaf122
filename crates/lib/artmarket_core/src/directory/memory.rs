//! In-memory user directory for tests and local development.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::{DirectoryError, UserDirectory};
use crate::models::auth::Role;
use crate::models::user::{
    NewUser, PageRequest, ProfileUpdate, UserFilter, UserPage, UserRecord, UserStatus,
    normalize_email,
};

/// Users keyed by id, with a unique email index.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: DashMap<String, UserRecord>,
    by_email: DashMap<String, String>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn modify(
        &self,
        id: &str,
        f: impl FnOnce(&mut UserRecord),
    ) -> Option<UserRecord> {
        let mut user = self.users.get_mut(id)?;
        let record = user.value_mut();
        f(record);
        record.updated_at = Utc::now();
        Some(record.clone())
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn load(&self, id: &str) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.users.get(id).map(|u| u.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let Some(id) = self
            .by_email
            .get(&normalize_email(email))
            .map(|id| id.value().clone())
        else {
            return Ok(None);
        };
        self.load(&id).await
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, DirectoryError> {
        let email = normalize_email(&user.email);
        let id = Uuid::now_v7().to_string();
        match self.by_email.entry(email.clone()) {
            Entry::Occupied(_) => return Err(DirectoryError::EmailTaken),
            Entry::Vacant(slot) => {
                slot.insert(id.clone());
            }
        }
        let now = Utc::now();
        let record = UserRecord {
            id: id.clone(),
            email,
            password_hash: user.password_hash,
            first_name: user.first_name.trim().to_string(),
            last_name: user.last_name.trim().to_string(),
            role: user.role,
            status: UserStatus::Active,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(id, record.clone());
        Ok(record)
    }

    async fn update_password(
        &self,
        id: &str,
        password_hash: &str,
    ) -> Result<bool, DirectoryError> {
        Ok(self
            .modify(id, |u| u.password_hash = password_hash.to_string())
            .is_some())
    }

    async fn update_profile(
        &self,
        id: &str,
        update: ProfileUpdate,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.modify(id, |u| {
            if let Some(first) = update.first_name {
                u.first_name = first.trim().to_string();
            }
            if let Some(last) = update.last_name {
                u.last_name = last.trim().to_string();
            }
        }))
    }

    async fn set_status(
        &self,
        id: &str,
        status: UserStatus,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.modify(id, |u| u.status = status))
    }

    async fn set_role(&self, id: &str, role: Role) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.modify(id, |u| u.role = role))
    }

    async fn list(
        &self,
        page: PageRequest,
        filter: UserFilter,
    ) -> Result<UserPage, DirectoryError> {
        let mut users: Vec<UserRecord> = self
            .users
            .iter()
            .filter(|u| filter.admits(u.value()))
            .map(|u| u.value().clone())
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        let total = users.len() as u64;
        let start = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let users = users
            .into_iter()
            .skip(start)
            .take(page.size as usize)
            .collect();
        Ok(UserPage {
            users,
            page: page.page,
            size: page.size,
            total,
        })
    }
}
