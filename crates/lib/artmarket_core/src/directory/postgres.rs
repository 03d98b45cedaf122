//! Postgres-backed user directory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{DirectoryError, UserDirectory};
use crate::models::auth::Role;
use crate::models::user::{
    NewUser, PageRequest, ProfileUpdate, UserFilter, UserPage, UserRecord, UserStatus,
    normalize_email,
};

const USER_COLUMNS: &str = "id::text AS id, email, password_hash, first_name, last_name, \
     role, status, is_active, created_at, updated_at";

/// `$1` role, `$2` status; a NULL bind matches every row.
const LIST_FILTER: &str =
    "WHERE ($1::text IS NULL OR role = $1) AND ($2::text IS NULL OR status = $2)";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    role: String,
    status: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = DirectoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|e| DirectoryError::CorruptRow(format!("user {}: {e}", row.id)))?;
        let status = row
            .status
            .parse::<UserStatus>()
            .map_err(|e| DirectoryError::CorruptRow(format!("user {}: {e}", row.id)))?;
        Ok(UserRecord {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            role,
            status,
            active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_record(row: Option<UserRow>) -> Result<Option<UserRecord>, DirectoryError> {
    row.map(UserRecord::try_from).transpose()
}

/// User directory over the `users` table.
#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run an `UPDATE ... WHERE id = $1 RETURNING <columns>` with one extra bind.
    async fn update_returning(
        &self,
        id: &str,
        set_clause: &str,
        value: &str,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        let Ok(id) = Uuid::parse_str(id) else {
            return Ok(None);
        };
        let sql = format!(
            "UPDATE users SET {set_clause}, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        into_record(row)
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    /// Fetch a user by ID. Non-UUID ids are simply unknown.
    async fn load(&self, id: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let Ok(id) = Uuid::parse_str(id) else {
            return Ok(None);
        };
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        into_record(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        into_record(row)
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, DirectoryError> {
        let sql = format!(
            "INSERT INTO users (email, password_hash, first_name, last_name, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(normalize_email(&user.email))
            .bind(&user.password_hash)
            .bind(user.first_name.trim())
            .bind(user.last_name.trim())
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    DirectoryError::EmailTaken
                }
                other => DirectoryError::DbError(other),
            })?;
        UserRecord::try_from(row)
    }

    async fn update_password(
        &self,
        id: &str,
        password_hash: &str,
    ) -> Result<bool, DirectoryError> {
        Ok(self
            .update_returning(id, "password_hash = $2", password_hash)
            .await?
            .is_some())
    }

    async fn update_profile(
        &self,
        id: &str,
        update: ProfileUpdate,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        let Ok(uid) = Uuid::parse_str(id) else {
            return Ok(None);
        };
        let sql = format!(
            "UPDATE users SET first_name = COALESCE($2, first_name), \
             last_name = COALESCE($3, last_name), updated_at = now() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(uid)
            .bind(update.first_name.as_deref().map(str::trim))
            .bind(update.last_name.as_deref().map(str::trim))
            .fetch_optional(&self.pool)
            .await?;
        into_record(row)
    }

    async fn set_status(
        &self,
        id: &str,
        status: UserStatus,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        self.update_returning(id, "status = $2", status.as_str()).await
    }

    async fn set_role(&self, id: &str, role: Role) -> Result<Option<UserRecord>, DirectoryError> {
        self.update_returning(id, "role = $2", role.as_str()).await
    }

    async fn list(
        &self,
        page: PageRequest,
        filter: UserFilter,
    ) -> Result<UserPage, DirectoryError> {
        let role = filter.role.map(|r| r.as_str());
        let status = filter.status.map(|s| s.as_str());
        let count_sql = format!("SELECT COUNT(*) FROM users {LIST_FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(role)
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users {LIST_FILTER} \
             ORDER BY created_at DESC, id LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(role)
            .bind(status)
            .bind(i64::from(page.size))
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        let users = rows
            .into_iter()
            .map(UserRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(UserPage {
            users,
            page: page.page,
            size: page.size,
            total: u64::try_from(total).unwrap_or(0),
        })
    }
}
