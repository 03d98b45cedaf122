//! Token revocation.
//!
//! A shared, expiring set of revoked token strings. Reads are best-effort:
//! callers treat [`DenylistError`] on `is_revoked` as "not revoked" and log it.
//! Writes must be reported back so logout can record the failure.

mod memory;
mod redis;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

pub use self::memory::MemoryDenylist;
pub use self::redis::RedisDenylist;

/// Key prefix for revoked tokens in the shared store.
pub const KEY_PREFIX: &str = "BLACKLIST:";

/// Default bound on a single denylist call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Denylist failures. Both variants mean "unknown", never "revoked".
#[derive(Debug, Error)]
pub enum DenylistError {
    #[error("denylist unavailable: {0}")]
    Unavailable(String),

    #[error("denylist call timed out after {0:?}")]
    Timeout(Duration),
}

/// Storage key for a revoked token.
pub fn denylist_key(token: &str) -> String {
    format!("{KEY_PREFIX}{token}")
}

/// Revocation store.
#[async_trait]
pub trait Denylist: Send + Sync {
    /// Insert `token`; the entry must survive at least `ttl`.
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<(), DenylistError>;

    /// Whether `token` has been revoked and not yet expired.
    async fn is_revoked(&self, token: &str) -> Result<bool, DenylistError>;
}

// =============================================================================
// Timeout wrapper
// =============================================================================

/// Hook run when a revocation is dropped before it completes.
pub type CancelHook = Arc<dyn Fn() + Send + Sync>;

/// Bounds every call on the wrapped backend.
pub struct TimedDenylist {
    inner: Arc<dyn Denylist>,
    timeout: Duration,
    on_cancelled: Option<CancelHook>,
}

impl TimedDenylist {
    pub fn new(inner: Arc<dyn Denylist>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            on_cancelled: None,
        }
    }

    /// Report revocations whose caller went away mid-write.
    pub fn on_cancelled_revocation(mut self, hook: CancelHook) -> Self {
        self.on_cancelled = Some(hook);
        self
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, DenylistError>>,
    ) -> Result<T, DenylistError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| DenylistError::Timeout(self.timeout))?
    }
}

/// Reports a revocation whose future was dropped before completing.
struct RevocationGuard<'a> {
    completed: bool,
    on_cancelled: Option<&'a CancelHook>,
}

impl Drop for RevocationGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            warn!("token revocation cancelled before completion");
            if let Some(hook) = self.on_cancelled {
                hook();
            }
        }
    }
}

#[async_trait]
impl Denylist for TimedDenylist {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<(), DenylistError> {
        let mut guard = RevocationGuard {
            completed: false,
            on_cancelled: self.on_cancelled.as_ref(),
        };
        let result = self.bounded(self.inner.revoke(token, ttl)).await;
        guard.completed = true;
        result
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, DenylistError> {
        self.bounded(self.inner.is_revoked(token)).await
    }
}
