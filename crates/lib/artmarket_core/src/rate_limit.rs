//! Per-client token buckets.
//!
//! Each key owns a bucket of `capacity` tokens that refills continuously at
//! `capacity / window`. Buckets sit in a sharded map; a request locks only its
//! own bucket, so different clients never contend.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Bucket shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub capacity: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self { capacity, window }
    }

    /// 5 requests per minute, for login and registration.
    pub fn login() -> Self {
        Self::new(5, Duration::from_secs(60))
    }

    /// 10 requests per minute across every `/api/auth/` path.
    pub fn auth_blanket() -> Self {
        Self::new(10, Duration::from_secs(60))
    }

    /// Bucket level is kept in "token-nanoseconds": one token is worth
    /// `window` nanoseconds of budget, and each elapsed nanosecond adds
    /// `capacity` of them. Integer math keeps refill exact.
    fn unit(&self) -> u128 {
        self.window.as_nanos().max(1)
    }

    fn full(&self) -> u128 {
        u128::from(self.capacity) * self.unit()
    }
}

/// Outcome of [`RateLimiter::try_consume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Whole tokens left after this request.
    pub remaining: u32,
    /// Seconds to wait before retrying; `0` when allowed.
    pub retry_after_secs: u64,
    /// Seconds until the bucket is full again.
    pub reset_after_secs: u64,
}

#[derive(Debug)]
struct Bucket {
    level: u128,
    last_refill: Instant,
    last_seen: Instant,
}

impl Bucket {
    fn full(config: &RateLimitConfig, now: Instant) -> Self {
        Self {
            level: config.full(),
            last_refill: now,
            last_seen: now,
        }
    }

    fn level_at(&self, config: &RateLimitConfig, now: Instant) -> u128 {
        // an older instant refills nothing
        let elapsed = now.saturating_duration_since(self.last_refill).as_nanos();
        let gained = elapsed.saturating_mul(u128::from(config.capacity));
        self.level.saturating_add(gained).min(config.full())
    }

    fn refill(&mut self, config: &RateLimitConfig, now: Instant) {
        self.level = self.level_at(config, now);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }

    fn secs_until_full(&self, config: &RateLimitConfig) -> u64 {
        let missing = config.full() - self.level;
        if missing == 0 {
            return 0;
        }
        let nanos = missing.div_ceil(u128::from(config.capacity.max(1)));
        u64::try_from(nanos.div_ceil(1_000_000_000)).unwrap_or(u64::MAX)
    }
}

/// Registry of token buckets keyed by client identity.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: DashMap<String, Arc<Mutex<Bucket>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    /// Take `cost` tokens from `key`'s bucket if available.
    pub fn try_consume(&self, key: &str, cost: u32) -> RateDecision {
        self.try_consume_at(key, cost, Instant::now())
    }

    /// [`try_consume`](Self::try_consume) against an explicit clock.
    pub fn try_consume_at(&self, key: &str, cost: u32, now: Instant) -> RateDecision {
        let bucket = self.bucket(key, now);
        // a poisoned bucket still holds valid numbers
        let mut bucket = bucket.lock().unwrap_or_else(|e| e.into_inner());
        bucket.refill(&self.config, now);
        if now > bucket.last_seen {
            bucket.last_seen = now;
        }

        let price = u128::from(cost) * self.config.unit();
        let allowed = bucket.level >= price;
        if allowed {
            bucket.level -= price;
        }
        let reset_after_secs = bucket.secs_until_full(&self.config);
        RateDecision {
            allowed,
            remaining: u32::try_from(bucket.level / self.config.unit()).unwrap_or(u32::MAX),
            retry_after_secs: if allowed { 0 } else { reset_after_secs.max(1) },
            reset_after_secs,
        }
    }

    fn bucket(&self, key: &str, now: Instant) -> Arc<Mutex<Bucket>> {
        if let Some(existing) = self.buckets.get(key) {
            return Arc::clone(existing.value());
        }
        let config = self.config;
        Arc::clone(
            self.buckets
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Bucket::full(&config, now))))
                .value(),
        )
    }

    /// Drop buckets that have been full and untouched for at least `idle_for`.
    /// Returns the number evicted.
    pub fn evict_idle(&self, idle_for: Duration, now: Instant) -> usize {
        let is_idle = |bucket: &Mutex<Bucket>| {
            let b = bucket.lock().unwrap_or_else(|e| e.into_inner());
            now.saturating_duration_since(b.last_seen) >= idle_for
                && b.level_at(&self.config, now) >= self.config.full()
        };

        let candidates: Vec<String> = self
            .buckets
            .iter()
            .filter(|entry| is_idle(Arc::as_ref(entry.value())))
            .map(|entry| entry.key().clone())
            .collect();

        candidates
            .into_iter()
            .filter(|key| {
                self.buckets
                    .remove_if(key, |_, bucket| {
                        Arc::strong_count(bucket) == 1 && is_idle(Arc::as_ref(bucket))
                    })
                    .is_some()
            })
            .count()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
