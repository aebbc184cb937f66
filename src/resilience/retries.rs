//! Bounded re-open loop for the local resource.
//!
//! # Design Decisions
//! - `max_retries` counts re-opens after the first attempt; 0 disables retrying
//! - The sleep happens only when another attempt follows
//! - A stall outcome that outlives the budget is handed back unchanged

use crate::storage::{OpenOutcome, OpenRequest, StorageFile};

use super::backoff::{stall_delay, Sleeper};

/// Final outcome of the open loop and how many stalls were waited out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAttempt {
    pub outcome: OpenOutcome,
    pub stalls: u32,
}

pub fn open_with_retry(
    file: &mut dyn StorageFile,
    request: &OpenRequest<'_>,
    max_retries: u32,
    sleeper: &dyn Sleeper,
) -> OpenAttempt {
    let mut stalls = 0;
    loop {
        let outcome = file.open(request);
        let Some(delay) = stall_delay(&outcome) else {
            return OpenAttempt { outcome, stalls };
        };
        if stalls >= max_retries {
            tracing::warn!(path = request.path, ?outcome, retries = stalls, "Local open still stalled; giving up");
            return OpenAttempt { outcome, stalls };
        }
        stalls += 1;
        tracing::info!(path = request.path, ?outcome, delay_secs = delay.as_secs(), "Local open stalled; retrying");
        sleeper.sleep(delay);
    }
}
