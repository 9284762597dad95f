//! Alert rate limiting
//!
//! Owns the (detection kind, camera) → last-accepted-time map. State is
//! process-local and starts cold on every launch.

use crate::detector::DetectionKind;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Time source seam so tests can drive the cooldown window directly
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests
pub struct ManualClock {
    start: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap();
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.offset.lock().unwrap()
    }
}

type Key = (DetectionKind, usize);

/// Minimum-spacing gate between accepted alerts of the same key
pub struct RateLimiter {
    cooldown: Duration,
    clock: Arc<dyn Clock>,
    last_accepted: HashMap<Key, Instant>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            cooldown,
            clock,
            last_accepted: HashMap::new(),
        }
    }

    pub fn with_system_clock(cooldown: Duration) -> Self {
        Self::new(cooldown, Arc::new(SystemClock))
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Whether an alert for this key may be accepted now. Keys never seen
    /// before are always allowed.
    pub fn is_allowed(&self, key: Key) -> bool {
        match self.last_accepted.get(&key) {
            Some(last) => self.clock.now().duration_since(*last) >= self.cooldown,
            None => true,
        }
    }

    /// Record an accepted alert, starting the key's cooldown window
    pub fn record(&mut self, key: Key) {
        self.last_accepted.insert(key, self.clock.now());
    }
}
