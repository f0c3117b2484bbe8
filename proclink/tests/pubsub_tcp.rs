//! Publisher / subscriber over TCP loopback.

mod common;

use std::time::Duration;

use proclink::bus::{create_publisher, EndpointState, Publisher, Subscriber};
use proclink::{Endpoint, EndpointAddress, MessagingError, SocketOptions};

use common::{next, wait_joined};

fn bind_ephemeral() -> (Publisher, EndpointAddress) {
    let publisher = Publisher::bind(&EndpointAddress::network("127.0.0.1", 0)).unwrap();
    let port = match publisher.last_endpoint() {
        Endpoint::Tcp(addr) => addr.port(),
        #[allow(unreachable_patterns)]
        other => panic!("unexpected endpoint {other}"),
    };
    assert_ne!(port, 0);
    (publisher, EndpointAddress::network("127.0.0.1", port))
}

#[test]
fn test_messages_arrive_in_order() {
    let (mut publisher, address) = bind_ephemeral();
    let mut subscriber = Subscriber::connect(&address, &["t"]).unwrap();
    wait_joined(&mut publisher, &mut subscriber, "t");

    for i in 0..200 {
        publisher.send("t", &format!("message {i}")).unwrap();
    }
    for i in 0..200 {
        let env = next(&mut subscriber);
        assert_eq!(env.topic, "t");
        assert_eq!(env.payload, format!("message {i}"));
    }
}

#[test]
fn test_unsubscribed_topic_never_observed() {
    let (mut publisher, address) = bind_ephemeral();
    let mut subscriber = Subscriber::connect(&address, &["a"]).unwrap();
    wait_joined(&mut publisher, &mut subscriber, "a");

    for i in 0..20 {
        publisher.send("b", &i.to_string()).unwrap();
    }
    publisher.send("a", "marker").unwrap();

    let env = next(&mut subscriber);
    assert_eq!(env.topic, "a");
    assert_eq!(env.payload, "marker");
    assert!(matches!(
        subscriber.try_recv(),
        Err(MessagingError::WouldBlock)
    ));
}

#[test]
fn test_prefix_subscription() {
    let (mut publisher, address) = bind_ephemeral();
    let mut subscriber = Subscriber::connect(&address, &["drone"]).unwrap();
    wait_joined(&mut publisher, &mut subscriber, "drone");

    publisher.send("drone_status", "up").unwrap();
    publisher.send("rover_status", "down").unwrap();
    publisher.send("drone_battery", "87").unwrap();

    assert_eq!(next(&mut subscriber).payload, "up");
    assert_eq!(next(&mut subscriber).payload, "87");
}

#[test]
fn test_empty_topic_list_receives_everything() {
    let (mut publisher, address) = bind_ephemeral();
    let mut subscriber = Subscriber::connect::<&str>(&address, &[]).unwrap();
    wait_joined(&mut publisher, &mut subscriber, "anything");

    publisher.send("zzz", "last one").unwrap();
    let env = next(&mut subscriber);
    assert_eq!((env.topic.as_str(), env.payload.as_str()), ("zzz", "last one"));
}

#[test]
fn test_try_recv_with_nothing_pending() {
    let (_publisher, address) = bind_ephemeral();
    let mut subscriber = Subscriber::connect(&address, &["t"]).unwrap();
    assert!(matches!(
        subscriber.try_recv(),
        Err(MessagingError::WouldBlock)
    ));
    assert_eq!(
        subscriber.recv_timeout(Duration::from_millis(10)).unwrap(),
        None
    );
}

#[test]
fn test_try_send_reports_full_queue() {
    let options = SocketOptions::default().with_send_hwm(1);
    let mut publisher =
        Publisher::bind_with_options(&EndpointAddress::network("127.0.0.1", 0), options).unwrap();

    // The hub drains the queue concurrently, so only a burst can observe it full.
    let mut saw_would_block = false;
    for i in 0..100_000 {
        match publisher.try_send("t", &i.to_string()) {
            Ok(()) => {}
            Err(MessagingError::WouldBlock) => {
                saw_would_block = true;
                break;
            }
            Err(e) => panic!("unexpected {e}"),
        }
    }
    assert!(saw_would_block);
}

#[test]
fn test_close_is_idempotent_and_final() {
    let (mut publisher, address) = bind_ephemeral();
    let mut subscriber = Subscriber::connect(&address, &["t"]).unwrap();

    subscriber.close();
    subscriber.close();
    assert_eq!(subscriber.state(), EndpointState::Closed);
    assert!(matches!(subscriber.recv(), Err(MessagingError::Closed)));
    assert!(matches!(subscriber.try_recv(), Err(MessagingError::Closed)));

    publisher.close();
    publisher.close();
    assert_eq!(publisher.state(), EndpointState::Closed);
    assert!(matches!(
        publisher.send("t", "late"),
        Err(MessagingError::Closed)
    ));
    assert!(matches!(
        publisher.try_send("t", "late"),
        Err(MessagingError::Closed)
    ));
}

#[test]
fn test_topic_with_space_rejected() {
    let (mut publisher, _) = bind_ephemeral();
    assert!(matches!(
        publisher.send("two words", "x"),
        Err(MessagingError::InvalidTopic(_))
    ));
}

#[test]
fn test_bind_conflict_keeps_os_error() {
    let (first, _) = bind_ephemeral();
    let port = match first.last_endpoint() {
        Endpoint::Tcp(addr) => addr.port().to_string(),
        #[allow(unreachable_patterns)]
        other => panic!("unexpected endpoint {other}"),
    };

    let err = create_publisher("tcp", "127.0.0.1", Some(&port)).unwrap_err();
    match err {
        MessagingError::Bind { endpoint, source } => {
            assert!(endpoint.contains(&port));
            assert_eq!(source.kind(), std::io::ErrorKind::AddrInUse);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_payload_with_spaces_survives() {
    let (mut publisher, address) = bind_ephemeral();
    let mut subscriber = Subscriber::connect(&address, &["t"]).unwrap();
    wait_joined(&mut publisher, &mut subscriber, "t");

    publisher.send("t", "  leading and trailing  ").unwrap();
    assert_eq!(next(&mut subscriber).payload, "  leading and trailing  ");
}

#[test]
fn test_mode_flag_variants() {
    let (mut publisher, address) = bind_ephemeral();
    let mut subscriber = Subscriber::connect(&address, &["t"]).unwrap();
    assert!(matches!(
        subscriber.recv_with(true),
        Err(MessagingError::WouldBlock)
    ));
    wait_joined(&mut publisher, &mut subscriber, "t");

    publisher.send_with("t", "blocking", false).unwrap();
    assert_eq!(subscriber.recv_with(false).unwrap(), "blocking");
}
