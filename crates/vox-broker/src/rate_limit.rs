//! Per-connection request spacing.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use vox_core::ConnId;

/// Default minimum spacing between a producer's admitted requests.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1000);

/// Last-accepted timestamps, one entry per open connection.
///
/// An entry exists from [`register`](Self::register) to
/// [`forget`](Self::forget). `None` means nothing was admitted yet, so the
/// first request is always admitted.
pub struct RateLimiter {
    min_interval: Duration,
    last_accepted: Mutex<HashMap<ConnId, Option<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter with the given minimum interval.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: Mutex::new(HashMap::new()),
        }
    }

    /// Start tracking a connection.
    pub fn register(&self, conn: &ConnId) {
        let _ = self.last_accepted.lock().insert(conn.clone(), None);
    }

    /// Stop tracking a connection. Idempotent.
    pub fn forget(&self, conn: &ConnId) {
        let _ = self.last_accepted.lock().remove(conn);
    }

    /// Admit or reject a request arriving at `now`.
    ///
    /// Admits when nothing was accepted yet or at least `min_interval` has
    /// elapsed since the last admission, recording `now`. Rejection leaves
    /// the entry untouched. Unknown connections are rejected.
    pub fn try_admit(&self, conn: &ConnId, now: Instant) -> bool {
        let mut table = self.last_accepted.lock();
        let Some(entry) = table.get_mut(conn) else {
            return false;
        };
        let admitted = match *entry {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        };
        if admitted {
            *entry = Some(now);
        }
        admitted
    }

    /// Number of tracked connections.
    pub fn len(&self) -> usize {
        self.last_accepted.lock().len()
    }

    /// Whether no connection is tracked.
    pub fn is_empty(&self) -> bool {
        self.last_accepted.lock().is_empty()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}
