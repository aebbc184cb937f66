//! Monitor id source for newly created storage handles.

use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out identifiers that are unique across concurrent requests.
pub trait SequenceSource: Send + Sync {
    fn next_id(&self) -> u64;
}

/// Process-local monotonically increasing counter.
#[derive(Debug, Default)]
pub struct AtomicSequence {
    next: AtomicU64,
}

impl AtomicSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl SequenceSource for AtomicSequence {
    fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}
