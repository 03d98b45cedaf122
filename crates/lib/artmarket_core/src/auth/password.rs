//! Password hashing via bcrypt, plus the password policy.
//!
//! bcrypt is CPU-bound, so every hash and verify runs on the blocking pool
//! behind a semaphore that caps how many run at once.

use std::sync::Arc;

use tokio::sync::Semaphore;

use super::AuthError;

/// Default bcrypt cost factor. Lower costs are refused.
pub const BCRYPT_COST: u32 = 10;

/// Characters that satisfy the "special character" rule.
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?";

/// Minimum password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Bounded bcrypt worker pool.
#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    permits: Arc<Semaphore>,
    dummy_hash: Arc<str>,
}

impl PasswordHasher {
    /// Build a hasher running at most `max_parallel` bcrypt operations at once.
    ///
    /// Computes a dummy hash up front so unknown-user logins can burn the same
    /// amount of work as real ones.
    pub fn new(cost: u32, max_parallel: usize) -> Result<Self, AuthError> {
        if cost < BCRYPT_COST {
            return Err(AuthError::KeyConfig(format!(
                "bcrypt cost must be at least {BCRYPT_COST} (got {cost})"
            )));
        }
        let dummy_hash = bcrypt::hash("artmarket-timing-equalizer", cost)
            .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))?;
        Ok(Self {
            cost,
            permits: Arc::new(Semaphore::new(max_parallel.max(1))),
            dummy_hash: dummy_hash.into(),
        })
    }

    /// Hash a password.
    pub async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_owned();
        let cost = self.cost;
        self.run(move || {
            bcrypt::hash(password, cost).map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
        })
        .await
    }

    /// Verify a password against a bcrypt hash.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        self.run(move || {
            bcrypt::verify(password, &hash)
                .map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))
        })
        .await
    }

    /// Verify against `hash`, or against the dummy hash when the user does not
    /// exist. The `None` branch always yields `false`.
    pub async fn verify_or_dummy(
        &self,
        password: &str,
        hash: Option<&str>,
    ) -> Result<bool, AuthError> {
        match hash {
            Some(h) => self.verify(password, h).await,
            None => {
                let dummy = Arc::clone(&self.dummy_hash);
                self.verify(password, &dummy).await.map(|_| false)
            }
        }
    }

    async fn run<T, F>(&self, job: F) -> Result<T, AuthError>
    where
        F: FnOnce() -> Result<T, AuthError> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| AuthError::Internal(format!("hash pool closed: {e}")))?;
        tokio::task::spawn_blocking(job)
            .await
            .map_err(|e| AuthError::Internal(format!("hash task failed: {e}")))?
    }
}

/// Every policy rule `password` breaks, in a stable order. Empty means valid.
pub fn password_policy_violations(password: &str) -> Vec<String> {
    let mut violations = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        violations.push(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        violations.push("Password must contain at least one uppercase letter".into());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        violations.push("Password must contain at least one lowercase letter".into());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push("Password must contain at least one digit".into());
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        violations.push("Password must contain at least one special character".into());
    }
    violations
}
