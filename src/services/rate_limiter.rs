use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::{config::RateLimitSettings, services::metrics};

/// Sweep idle buckets opportunistically once every this many `allow` calls.
const SWEEP_EVERY: u64 = 256;

/// Token-bucket state for one client key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucket {
    pub capacity: u32,
    pub refill_every: Duration,
    pub available: f64,
    pub last_refill_at: Instant,
    pub last_seen_at: Instant,
}

impl TokenBucket {
    fn full(settings: RateLimitSettings, now: Instant) -> Self {
        Self {
            capacity: settings.capacity,
            refill_every: settings.refill_every,
            available: f64::from(settings.capacity),
            last_refill_at: now,
            last_seen_at: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill_at);
        if elapsed.is_zero() {
            return;
        }
        let gained = elapsed.as_secs_f64() / self.refill_every.as_secs_f64();
        self.available = (self.available + gained).min(f64::from(self.capacity));
        self.last_refill_at = now;
    }

    fn try_take(&mut self, now: Instant) -> bool {
        self.refill(now);
        self.last_seen_at = self.last_seen_at.max(now);
        if self.available >= 1.0 {
            self.available -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time after which an untouched bucket is back at capacity.
    fn full_refill_time(&self) -> Duration {
        self.refill_every.saturating_mul(self.capacity)
    }
}

struct Inner {
    buckets: HashMap<String, TokenBucket>,
    calls: u64,
}

/// Per-client token buckets behind one exclusive lock.
///
/// The lock covers lookup-or-create and the bucket update together and is
/// never held across I/O. A sharded map is the next step if contention shows up.
pub struct RateLimiterRegistry {
    name: &'static str,
    settings: RateLimitSettings,
    idle_ttl: Duration,
    inner: Mutex<Inner>,
}

impl RateLimiterRegistry {
    pub fn new(name: &'static str, settings: RateLimitSettings, idle_ttl: Duration) -> Self {
        Self {
            name,
            settings,
            idle_ttl,
            inner: Mutex::new(Inner { buckets: HashMap::new(), calls: 0 }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn settings(&self) -> RateLimitSettings {
        self.settings
    }

    /// Snapshot of the bucket for `key`, creating a full one on first sight.
    pub fn get_or_create_bucket(&self, key: &str) -> TokenBucket {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let created = !inner.buckets.contains_key(key);
        let bucket = *inner
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::full(self.settings, now));
        if created {
            metrics::set_bucket_count(self.name, inner.buckets.len());
        }
        bucket
    }

    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// Consume one token for `key` as of `now`; false when the bucket is empty.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut inner = self.inner.lock();

        inner.calls = inner.calls.wrapping_add(1);
        if inner.calls % SWEEP_EVERY == 0 {
            self.sweep(&mut inner, now);
        }

        let allowed = match inner.buckets.get_mut(key) {
            Some(bucket) => bucket.try_take(now),
            None => {
                let mut bucket = TokenBucket::full(self.settings, now);
                let allowed = bucket.try_take(now);
                inner.buckets.insert(key.to_string(), bucket);
                metrics::set_bucket_count(self.name, inner.buckets.len());
                allowed
            }
        };
        drop(inner);

        if !allowed {
            metrics::record_rejection(self.name);
        }
        allowed
    }

    /// Drop buckets idle long enough to have refilled completely; a fresh bucket
    /// for the same key behaves identically. Returns how many were removed.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let mut inner = self.inner.lock();
        self.sweep(&mut inner, now)
    }

    fn sweep(&self, inner: &mut Inner, now: Instant) -> usize {
        let before = inner.buckets.len();
        let idle_ttl = self.idle_ttl;
        inner.buckets.retain(|_, b| {
            let ttl = idle_ttl.max(b.full_refill_time());
            now.saturating_duration_since(b.last_seen_at) < ttl
        });
        let removed = before - inner.buckets.len();
        if removed > 0 {
            tracing::debug!(limiter = self.name, removed, "evicted idle rate-limit buckets");
            metrics::set_bucket_count(self.name, inner.buckets.len());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
