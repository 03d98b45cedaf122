//! User directory.
//!
//! The relational view of users the core reads on every authenticated request
//! and the auth service writes on registration and password changes.

mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;

pub use self::memory::MemoryUserDirectory;
pub use self::postgres::PgUserDirectory;
use crate::models::auth::Role;
use crate::models::user::{
    NewUser, PageRequest, ProfileUpdate, UserFilter, UserPage, UserRecord, UserStatus,
};

/// Directory errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Email already registered")]
    EmailTaken,

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Corrupt user row: {0}")]
    CorruptRow(String),
}

/// Read and write access to user records.
///
/// Implementations normalize emails with
/// [`normalize_email`](crate::models::user::normalize_email) on every call.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<UserRecord>, DirectoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError>;

    /// Fails with [`DirectoryError::EmailTaken`] on a duplicate email.
    async fn create(&self, user: NewUser) -> Result<UserRecord, DirectoryError>;

    /// Returns `false` when the user does not exist.
    async fn update_password(&self, id: &str, password_hash: &str)
    -> Result<bool, DirectoryError>;

    async fn update_profile(
        &self,
        id: &str,
        update: ProfileUpdate,
    ) -> Result<Option<UserRecord>, DirectoryError>;

    async fn set_status(
        &self,
        id: &str,
        status: UserStatus,
    ) -> Result<Option<UserRecord>, DirectoryError>;

    async fn set_role(&self, id: &str, role: Role) -> Result<Option<UserRecord>, DirectoryError>;

    /// Newest users first, narrowed by `filter`. Totals count matching users.
    async fn list(&self, page: PageRequest, filter: UserFilter)
    -> Result<UserPage, DirectoryError>;
}
