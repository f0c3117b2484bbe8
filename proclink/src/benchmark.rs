//! Latency measurement helpers.
//!
//! A [`LatencyTimer`] measures how long a local operation took. Cross-process
//! delay is measured by embedding [`unix_timestamp`] in a payload and calling
//! [`skew_from_now`] on the receiving side; that figure is only as good as
//! the clock agreement between the two processes.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use thiserror::Error;

/// Errors from [`LatencyTimer`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// `stop` was called before `start`
    #[error("Latency timer was not started")]
    NotStarted,
}

/// Measures elapsed time between `start` and `stop`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LatencyTimer {
    started: Option<Instant>,
}

impl LatencyTimer {
    /// Timer that has not been started.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start instant, replacing any earlier one.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Seconds since the last `start`.
    ///
    /// The start instant is kept, so repeated calls measure from the same
    /// point.
    pub fn stop(&self) -> Result<f64, TimerError> {
        self.started
            .map(|t| t.elapsed().as_secs_f64())
            .ok_or(TimerError::NotStarted)
    }

    /// Whether `start` was called.
    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }
}

/// Current wall-clock time in seconds since the Unix epoch.
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Seconds between `reference` (Unix seconds) and now.
///
/// Negative when `reference` lies in the future.
pub fn skew_from_now(reference: f64) -> f64 {
    unix_timestamp() - reference
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_stop_without_start() {
        let timer = LatencyTimer::new();
        assert_eq!(timer.stop(), Err(TimerError::NotStarted));
        assert!(!timer.is_started());
    }

    #[test]
    fn test_elapsed_tracks_wall_gap() {
        let mut timer = LatencyTimer::new();
        timer.start();
        std::thread::sleep(Duration::from_millis(20));
        let elapsed = timer.stop().unwrap();
        assert!(elapsed >= 0.020, "{elapsed}");
        assert!(elapsed < 0.070, "{elapsed}");
    }

    #[test]
    fn test_stop_does_not_reset() {
        let mut timer = LatencyTimer::new();
        timer.start();
        let first = timer.stop().unwrap();
        let second = timer.stop().unwrap();
        assert!(second >= first);
    }

    #[test]
    fn test_skew() {
        let past = unix_timestamp() - 2.0;
        let skew = skew_from_now(past);
        assert!((2.0..2.5).contains(&skew), "{skew}");
        assert!(skew_from_now(unix_timestamp() + 60.0) < 0.0);
    }
}
