//! Socket configuration options
//!
//! Knobs for bus endpoints, named after their libzmq counterparts.

use std::time::Duration;

/// Socket configuration options.
///
/// # Examples
///
/// ```
/// use proclink_core::options::SocketOptions;
/// use std::time::Duration;
///
/// let opts = SocketOptions::default()
///     .with_send_hwm(10_000)
///     .with_linger(Some(Duration::from_millis(500)));
/// ```
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Handshake timeout (ZMQ_HANDSHAKE_IVL)
    ///
    /// Maximum time to complete the ZMTP greeting and READY exchange.
    /// `Duration::ZERO` disables the timeout.
    pub handshake_timeout: Duration,

    /// Linger timeout (ZMQ_LINGER)
    ///
    /// How long `close` waits for queued messages to be written.
    /// - `None` or `Some(Duration::ZERO)`: discard pending messages
    pub linger: Option<Duration>,

    /// Reconnect interval (ZMQ_RECONNECT_IVL)
    pub reconnect_ivl: Duration,

    /// Maximum reconnect interval (ZMQ_RECONNECT_IVL_MAX)
    ///
    /// - `Duration::ZERO`: always wait `reconnect_ivl`
    /// - otherwise: double `reconnect_ivl` per attempt up to this value
    pub reconnect_ivl_max: Duration,

    /// Receive high water mark (ZMQ_RCVHWM)
    ///
    /// Messages queued for the application. Arrivals beyond it are dropped.
    pub recv_hwm: usize,

    /// Send high water mark (ZMQ_SNDHWM)
    ///
    /// Messages queued for the I/O thread. A blocking send waits while the
    /// queue is full; a non-blocking send fails with `WouldBlock`.
    pub send_hwm: usize,

    /// Maximum message size (ZMQ_MAXMSGSIZE). `None` means no limit.
    ///
    /// A peer that announces a larger frame is disconnected.
    pub max_msg_size: Option<usize>,

    /// TCP keepalive idle time. `None` leaves the OS default.
    pub tcp_keepalive: Option<Duration>,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(30),
            linger: Some(Duration::from_secs(1)),
            reconnect_ivl: Duration::from_millis(100),
            reconnect_ivl_max: Duration::ZERO,
            recv_hwm: 1000,
            send_hwm: 1000,
            max_msg_size: None,
            tcp_keepalive: None,
        }
    }
}

impl SocketOptions {
    /// Create new socket options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set linger timeout.
    pub fn with_linger(mut self, linger: Option<Duration>) -> Self {
        self.linger = linger;
        self
    }

    /// Set reconnection interval.
    pub fn with_reconnect_ivl(mut self, ivl: Duration) -> Self {
        self.reconnect_ivl = ivl;
        self
    }

    /// Set maximum reconnection interval for exponential backoff.
    pub fn with_reconnect_ivl_max(mut self, max: Duration) -> Self {
        self.reconnect_ivl_max = max;
        self
    }

    /// Set receive high water mark. Zero is treated as one.
    pub fn with_recv_hwm(mut self, hwm: usize) -> Self {
        self.recv_hwm = hwm.max(1);
        self
    }

    /// Set send high water mark. Zero is treated as one.
    pub fn with_send_hwm(mut self, hwm: usize) -> Self {
        self.send_hwm = hwm.max(1);
        self
    }

    /// Set maximum message size.
    pub fn with_max_msg_size(mut self, size: Option<usize>) -> Self {
        self.max_msg_size = size;
        self
    }

    /// Set TCP keepalive idle time.
    pub fn with_tcp_keepalive(mut self, idle: Option<Duration>) -> Self {
        self.tcp_keepalive = idle;
        self
    }

    /// Effective linger, `None` when pending messages are discarded.
    #[must_use]
    pub fn effective_linger(&self) -> Option<Duration> {
        self.linger.filter(|d| !d.is_zero())
    }

    /// Effective handshake timeout, `None` when disabled.
    #[must_use]
    pub fn effective_handshake_timeout(&self) -> Option<Duration> {
        Some(self.handshake_timeout).filter(|d| !d.is_zero())
    }
}
