//! Reconnection backoff, following libzmq's RECONNECT_IVL / RECONNECT_IVL_MAX.

use crate::options::SocketOptions;
use std::time::Duration;

/// Tracks connection attempts of one subscriber and yields backoff delays.
///
/// With `reconnect_ivl_max == 0` every delay is the base interval; otherwise
/// the delay doubles per attempt up to the maximum.
///
/// # Example
///
/// ```rust
/// use proclink_core::reconnect::ReconnectState;
/// use proclink_core::options::SocketOptions;
/// use std::time::Duration;
///
/// let options = SocketOptions::default()
///     .with_reconnect_ivl(Duration::from_millis(100))
///     .with_reconnect_ivl_max(Duration::from_secs(10));
///
/// let mut reconnect = ReconnectState::new(&options);
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(100));
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(200));
///
/// reconnect.reset();
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectState {
    base_interval: Duration,
    max_interval: Duration,
    attempt: u32,
    current_interval: Duration,
}

impl ReconnectState {
    pub const fn new(options: &SocketOptions) -> Self {
        Self {
            base_interval: options.reconnect_ivl,
            max_interval: options.reconnect_ivl_max,
            attempt: 0,
            current_interval: options.reconnect_ivl,
        }
    }

    /// Delay to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_interval;
        self.attempt = self.attempt.saturating_add(1);

        if self.max_interval.is_zero() {
            self.current_interval = self.base_interval;
        } else {
            self.current_interval = self
                .base_interval
                .saturating_mul(1_u32 << self.attempt.min(16))
                .min(self.max_interval.max(self.base_interval));
        }

        delay
    }

    /// Back to the base interval after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.current_interval = self.base_interval;
    }

    #[inline]
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    #[inline]
    #[must_use]
    pub const fn current_interval(&self) -> Duration {
        self.current_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let options = SocketOptions::default()
            .with_reconnect_ivl(Duration::from_millis(100))
            .with_reconnect_ivl_max(Duration::from_secs(10));

        let mut state = ReconnectState::new(&options);

        assert_eq!(state.next_delay(), Duration::from_millis(100));
        assert_eq!(state.attempt(), 1);
        assert_eq!(state.next_delay(), Duration::from_millis(200));
        assert_eq!(state.next_delay(), Duration::from_millis(400));
        assert_eq!(state.next_delay(), Duration::from_millis(800));
        assert_eq!(state.attempt(), 4);
    }

    #[test]
    fn test_max_interval_cap() {
        let options = SocketOptions::default()
            .with_reconnect_ivl(Duration::from_millis(100))
            .with_reconnect_ivl_max(Duration::from_millis(500));

        let mut state = ReconnectState::new(&options);

        assert_eq!(state.next_delay(), Duration::from_millis(100));
        assert_eq!(state.next_delay(), Duration::from_millis(200));
        assert_eq!(state.next_delay(), Duration::from_millis(400));
        assert_eq!(state.next_delay(), Duration::from_millis(500));
        assert_eq!(state.next_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_zero_max_keeps_base_interval() {
        let options = SocketOptions::default()
            .with_reconnect_ivl(Duration::from_millis(100))
            .with_reconnect_ivl_max(Duration::ZERO);

        let mut state = ReconnectState::new(&options);

        for _ in 0..5 {
            assert_eq!(state.next_delay(), Duration::from_millis(100));
        }
    }

    #[test]
    fn test_max_below_base_never_shrinks() {
        let options = SocketOptions::default()
            .with_reconnect_ivl(Duration::from_millis(300))
            .with_reconnect_ivl_max(Duration::from_millis(100));

        let mut state = ReconnectState::new(&options);
        state.next_delay();
        assert_eq!(state.next_delay(), Duration::from_millis(300));
    }

    #[test]
    fn test_reset() {
        let options = SocketOptions::default()
            .with_reconnect_ivl(Duration::from_millis(100))
            .with_reconnect_ivl_max(Duration::from_secs(10));

        let mut state = ReconnectState::new(&options);
        state.next_delay();
        state.next_delay();
        state.reset();

        assert_eq!(state.attempt(), 0);
        assert_eq!(state.current_interval(), Duration::from_millis(100));
    }
}
