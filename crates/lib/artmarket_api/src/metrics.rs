//! Admission counters.
//!
//! Process-local counters for the events the access layer must make
//! observable without surfacing them to clients.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct AdmissionMetrics {
    denylist_unavailable: AtomicU64,
    revocation_unavailable: AtomicU64,
    directory_failures: AtomicU64,
    rate_limited: AtomicU64,
    denied_anonymous: AtomicU64,
    denied_role: AtomicU64,
    denied_ownership: AtomicU64,
}

/// Point-in-time copy of [`AdmissionMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionSnapshot {
    pub denylist_unavailable: u64,
    pub revocation_unavailable: u64,
    pub directory_failures: u64,
    pub rate_limited: u64,
    pub denied_anonymous: u64,
    pub denied_role: u64,
    pub denied_ownership: u64,
}

fn bump(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

impl AdmissionMetrics {
    /// Denylist read failed or timed out; the token was treated as not revoked.
    pub fn record_denylist_unavailable(&self) -> u64 {
        bump(&self.denylist_unavailable)
    }

    /// Logout could not write a revocation.
    pub fn record_revocation_unavailable(&self) -> u64 {
        bump(&self.revocation_unavailable)
    }

    /// User directory call failed or timed out.
    pub fn record_directory_failure(&self) -> u64 {
        bump(&self.directory_failures)
    }

    pub fn record_rate_limited(&self) -> u64 {
        bump(&self.rate_limited)
    }

    pub fn record_denied_anonymous(&self) -> u64 {
        bump(&self.denied_anonymous)
    }

    pub fn record_denied_role(&self) -> u64 {
        bump(&self.denied_role)
    }

    pub fn record_denied_ownership(&self) -> u64 {
        bump(&self.denied_ownership)
    }

    pub fn snapshot(&self) -> AdmissionSnapshot {
        AdmissionSnapshot {
            denylist_unavailable: self.denylist_unavailable.load(Ordering::Relaxed),
            revocation_unavailable: self.revocation_unavailable.load(Ordering::Relaxed),
            directory_failures: self.directory_failures.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            denied_anonymous: self.denied_anonymous.load(Ordering::Relaxed),
            denied_role: self.denied_role.load(Ordering::Relaxed),
            denied_ownership: self.denied_ownership.load(Ordering::Relaxed),
        }
    }
}
