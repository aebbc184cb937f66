//! Minimum-throughput watchdog.
//!
//! The exchange is aborted when fewer than `limit_bytes` move in any window of
//! `window` length. Bytes in both directions count.

use std::time::Duration;
use tokio::time::Instant;

use super::EngineError;

/// Throughput floor: at least `limit_bytes` every `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowSpeedLimit {
    pub limit_bytes: u64,
    pub window: Duration,
}

impl Default for LowSpeedLimit {
    // 1 MiB every 2 minutes, roughly 8 KiB/s.
    fn default() -> Self {
        Self {
            limit_bytes: 1024 * 1024,
            window: Duration::from_secs(2 * 60),
        }
    }
}

impl LowSpeedLimit {
    pub fn disabled(&self) -> bool {
        self.limit_bytes == 0 || self.window.is_zero()
    }
}

#[derive(Debug)]
pub struct LowSpeedWatchdog {
    limit: LowSpeedLimit,
    window_start: Instant,
    window_bytes: u64,
}

impl LowSpeedWatchdog {
    pub fn new(limit: LowSpeedLimit) -> Self {
        Self::starting_at(limit, Instant::now())
    }

    pub fn starting_at(limit: LowSpeedLimit, now: Instant) -> Self {
        Self {
            limit,
            window_start: now,
            window_bytes: 0,
        }
    }

    pub fn record(&mut self, bytes: usize) {
        self.window_bytes = self.window_bytes.saturating_add(bytes as u64);
    }

    /// End of the current window. Far in the future when the watchdog is disabled.
    pub fn deadline(&self) -> Instant {
        if self.limit.disabled() {
            // About thirty years; tokio caps sleeps well past this anyway.
            self.window_start + Duration::from_secs(86400 * 365 * 30)
        } else {
            self.window_start + self.limit.window
        }
    }

    /// Called when the window has elapsed: fail if it moved too little, else open a new one.
    pub fn check(&mut self, now: Instant) -> Result<(), EngineError> {
        if self.limit.disabled() || now < self.deadline() {
            return Ok(());
        }
        if self.window_bytes < self.limit.limit_bytes {
            tracing::warn!(
                moved = self.window_bytes,
                required = self.limit.limit_bytes,
                window = ?self.limit.window,
                "Transfer below minimum speed"
            );
            return Err(EngineError::LowSpeed {
                limit_bytes: self.limit.limit_bytes,
                window: self.limit.window,
            });
        }
        self.window_start = now;
        self.window_bytes = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit() -> LowSpeedLimit {
        LowSpeedLimit {
            limit_bytes: 100,
            window: Duration::from_secs(10),
        }
    }

    #[test]
    fn slow_window_aborts() {
        let start = Instant::now();
        let mut dog = LowSpeedWatchdog::starting_at(limit(), start);
        dog.record(99);
        let err = dog.check(start + Duration::from_secs(10)).unwrap_err();
        assert!(matches!(err, EngineError::LowSpeed { limit_bytes: 100, .. }));
    }

    #[test]
    fn fast_window_rolls_over() {
        let start = Instant::now();
        let mut dog = LowSpeedWatchdog::starting_at(limit(), start);
        dog.record(60);
        dog.record(40);
        let later = start + Duration::from_secs(10);
        assert!(dog.check(later).is_ok());
        assert_eq!(dog.deadline(), later + Duration::from_secs(10));

        // Nothing moved in the second window.
        assert!(dog.check(later + Duration::from_secs(10)).is_err());
    }

    #[test]
    fn early_check_is_noop() {
        let start = Instant::now();
        let mut dog = LowSpeedWatchdog::starting_at(limit(), start);
        assert!(dog.check(start + Duration::from_secs(3)).is_ok());
    }

    #[test]
    fn zero_limit_disables() {
        let start = Instant::now();
        let disabled = LowSpeedLimit {
            limit_bytes: 0,
            window: Duration::from_secs(1),
        };
        let mut dog = LowSpeedWatchdog::starting_at(disabled, start);
        assert!(dog.check(start + Duration::from_secs(3600)).is_ok());
    }
}
