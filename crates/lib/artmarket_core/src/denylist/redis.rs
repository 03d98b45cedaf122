//! Redis-backed denylist shared by every API node.
//!
//! Entries are `BLACKLIST:<token>` → `"true"` with `SET EX`, so Redis expires
//! them on its own once the token would have expired anyway.

use std::time::Duration;

use ::redis::AsyncCommands;
use ::redis::Client;
use ::redis::aio::ConnectionManager;
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::info;

use super::{Denylist, DenylistError, denylist_key};

/// Denylist stored in Redis.
///
/// The connection is opened lazily on first use, so a Redis outage at boot
/// degrades revocation instead of preventing startup.
pub struct RedisDenylist {
    client: Client,
    conn: OnceCell<ConnectionManager>,
}

impl RedisDenylist {
    /// Parse the connection URL (e.g. `redis://localhost:6379/0`).
    pub fn open(url: &str) -> Result<Self, DenylistError> {
        let client = Client::open(url)
            .map_err(|e| DenylistError::Unavailable(format!("invalid redis url: {e}")))?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, DenylistError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let manager = ConnectionManager::new(self.client.clone()).await?;
                info!("connected to redis denylist");
                Ok::<_, ::redis::RedisError>(manager)
            })
            .await
            .map_err(|e| DenylistError::Unavailable(format!("redis connect: {e}")))?;
        Ok(conn.clone())
    }
}

/// Redis `EX` takes whole seconds; round up and never go below one.
fn ttl_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

#[async_trait]
impl Denylist for RedisDenylist {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<(), DenylistError> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(denylist_key(token), "true", ttl_seconds(ttl))
            .await
            .map_err(|e| DenylistError::Unavailable(format!("redis SET failed: {e}")))
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, DenylistError> {
        let mut conn = self.connection().await?;
        conn.exists::<_, bool>(denylist_key(token))
            .await
            .map_err(|e| DenylistError::Unavailable(format!("redis EXISTS failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_rounds_up_to_whole_seconds() {
        assert_eq!(ttl_seconds(Duration::from_millis(1)), 1);
        assert_eq!(ttl_seconds(Duration::from_millis(1500)), 2);
        assert_eq!(ttl_seconds(Duration::from_secs(3600)), 3600);
        assert_eq!(ttl_seconds(Duration::ZERO), 1);
    }

    #[test]
    fn open_rejects_malformed_url() {
        assert!(RedisDenylist::open("not a url").is_err());
    }
}
