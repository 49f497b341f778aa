//! Wall clock that never goes backwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::project::Timestamp;

/// Issues millisecond timestamps that never decrease, even if the system
/// clock is stepped back.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicU64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Timestamp {
        self.observe(wall_millis())
    }

    fn observe(&self, wall: u64) -> Timestamp {
        let prev = self.last.fetch_max(wall, Ordering::SeqCst);
        Timestamp(prev.max(wall))
    }
}

fn wall_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
