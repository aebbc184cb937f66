//! Back-off delays for stall-class open outcomes.

use std::time::Duration;

use crate::storage::OpenOutcome;

/// Something that can block the current thread for a while.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the calling thread. Only ever used from the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Delay before re-opening after `outcome`, or `None` when the outcome is final.
///
/// A stall carries the exact wait. A started staging operation reports its
/// estimated duration; half of it plus five seconds is waited.
pub fn stall_delay(outcome: &OpenOutcome) -> Option<Duration> {
    match outcome {
        OpenOutcome::Stall(secs) => Some(Duration::from_secs(u64::from(*secs))),
        OpenOutcome::Started(secs) => Some(Duration::from_secs(u64::from(*secs / 2) + 5)),
        _ => None,
    }
}
