//! Process-local denylist for single-node deployments and tests.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Denylist, DenylistError};

/// In-memory denylist keyed by token, storing each entry's expiry.
#[derive(Debug, Default)]
pub struct MemoryDenylist {
    entries: DashMap<String, Instant>,
}

impl MemoryDenylist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evict expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        let now = Instant::now();
        self.entries.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Denylist for MemoryDenylist {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<(), DenylistError> {
        let expires_at = Instant::now() + ttl;
        self.entries
            .entry(token.to_string())
            .and_modify(|existing| {
                if *existing < expires_at {
                    *existing = expires_at;
                }
            })
            .or_insert(expires_at);
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, DenylistError> {
        let now = Instant::now();
        let live = match self.entries.get(token) {
            Some(expires_at) => *expires_at > now,
            None => return Ok(false),
        };
        if !live {
            self.entries.remove_if(token, |_, expires_at| *expires_at <= now);
        }
        Ok(live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn revoked_token_is_reported() {
        let list = MemoryDenylist::new();
        list.revoke("tok", Duration::from_secs(60)).await.unwrap();
        assert!(list.is_revoked("tok").await.unwrap());
        assert!(!list.is_revoked("other").await.unwrap());
    }

    #[tokio::test]
    async fn entry_disappears_after_ttl() {
        let list = MemoryDenylist::new();
        list.revoke("tok", Duration::from_millis(30)).await.unwrap();
        assert!(list.is_revoked("tok").await.unwrap());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!list.is_revoked("tok").await.unwrap());
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn re_revoking_never_shortens_ttl() {
        let list = MemoryDenylist::new();
        list.revoke("tok", Duration::from_secs(60)).await.unwrap();
        list.revoke("tok", Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(list.is_revoked("tok").await.unwrap());
    }

    #[tokio::test]
    async fn purge_removes_only_expired() {
        let list = MemoryDenylist::new();
        list.revoke("short", Duration::from_millis(5)).await.unwrap();
        list.revoke("long", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(list.purge_expired(), 1);
        assert_eq!(list.len(), 1);
    }
}
