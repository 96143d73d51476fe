//! Process-wide resource holder with a coarse time-based expiry.
//!
//! Holds the backing-store client handle so requests share one connection pool, but
//! rebuilds it on first access after the TTL so nothing holds a stale handle forever.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_CLIENT_TTL: Duration = Duration::from_secs(55 * 60);

struct Cached<T> {
    value: T,
    created: Instant,
}

pub struct SharedHandle<T> {
    slot: Mutex<Option<Cached<T>>>,
    ttl: Duration,
    build: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T: Clone> SharedHandle<T> {
    pub fn new(ttl: Duration, build: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            slot: Mutex::new(None),
            ttl,
            build: Box::new(build),
        }
    }

    pub fn get(&self) -> T {
        self.get_at(Instant::now())
    }

    /// Current value, built on first use and rebuilt once older than the TTL.
    pub fn get_at(&self, now: Instant) -> T {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let stale = match slot.as_ref() {
            Some(cached) => now.saturating_duration_since(cached.created) > self.ttl,
            None => true,
        };
        if stale {
            debug!(ttl_secs = self.ttl.as_secs(), "building shared client handle");
            *slot = Some(Cached {
                value: (self.build)(),
                created: now,
            });
        }
        match slot.as_ref() {
            Some(cached) => cached.value.clone(),
            None => (self.build)(),
        }
    }
}
