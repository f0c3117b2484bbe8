//! Integration tests for socket options

use proclink_core::options::SocketOptions;
use proclink_core::reconnect::ReconnectState;
use std::time::Duration;

#[test]
fn test_default_values() {
    let opts = SocketOptions::default();

    assert_eq!(opts.send_hwm, 1000);
    assert_eq!(opts.recv_hwm, 1000);
    assert_eq!(opts.handshake_timeout, Duration::from_secs(30));
    assert_eq!(opts.reconnect_ivl, Duration::from_millis(100));
    assert_eq!(opts.reconnect_ivl_max, Duration::ZERO);
    assert_eq!(opts.max_msg_size, None);
    assert_eq!(opts.tcp_keepalive, None);
}

#[test]
fn test_builder_chain() {
    let opts = SocketOptions::new()
        .with_send_hwm(10)
        .with_recv_hwm(20)
        .with_linger(None)
        .with_max_msg_size(Some(4096))
        .with_tcp_keepalive(Some(Duration::from_secs(60)));

    assert_eq!(opts.send_hwm, 10);
    assert_eq!(opts.recv_hwm, 20);
    assert_eq!(opts.effective_linger(), None);
    assert_eq!(opts.max_msg_size, Some(4096));
    assert_eq!(opts.tcp_keepalive, Some(Duration::from_secs(60)));
}

#[test]
fn test_zero_hwm_clamped() {
    let opts = SocketOptions::new().with_send_hwm(0).with_recv_hwm(0);
    assert_eq!(opts.send_hwm, 1);
    assert_eq!(opts.recv_hwm, 1);
}

#[test]
fn test_zero_durations_disable() {
    let opts = SocketOptions::new()
        .with_linger(Some(Duration::ZERO))
        .with_handshake_timeout(Duration::ZERO);

    assert_eq!(opts.effective_linger(), None);
    assert_eq!(opts.effective_handshake_timeout(), None);
}

#[test]
fn test_reconnect_state_from_options() {
    let opts = SocketOptions::new()
        .with_reconnect_ivl(Duration::from_millis(50))
        .with_reconnect_ivl_max(Duration::from_millis(150));
    let mut state = ReconnectState::new(&opts);

    assert_eq!(state.next_delay(), Duration::from_millis(50));
    assert_eq!(state.next_delay(), Duration::from_millis(100));
    assert_eq!(state.next_delay(), Duration::from_millis(150));
    assert_eq!(state.next_delay(), Duration::from_millis(150));
}
