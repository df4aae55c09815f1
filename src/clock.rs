//! Wall clock used for staleness checks

use std::time::{SystemTime, UNIX_EPOCH};

use crate::timestamp::Timestamp;

/// Source of the current wall-clock time
pub trait WallClock {
    /// Current time
    fn now(&self) -> Timestamp;

    /// Current time truncated to whole seconds
    fn now_secs(&self) -> i64 {
        self.now().secs
    }
}

/// The host's realtime clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> Timestamp {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => Timestamp::new(d.as_secs() as i64, d.subsec_nanos()),
            // Clock set before 1970.
            Err(e) => {
                let d = e.duration();
                Timestamp::from_parts(-(d.as_secs() as i64), -(d.subsec_nanos() as i64))
            }
        }
    }
}

impl<C: WallClock + ?Sized> WallClock for &C {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}
