//! Publisher and subscriber on a fixed TCP port, timestamped payloads.

mod common;

use std::thread;
use std::time::Duration;

use proclink::benchmark::{skew_from_now, unix_timestamp, LatencyTimer};
use proclink::bus::{create_publisher, create_subscriber};

use common::wait_joined;

#[test]
fn test_drone_status_end_to_end() {
    let mut publisher = create_publisher("tcp", "*", Some("5556")).unwrap();
    let mut subscriber =
        create_subscriber("tcp", "127.0.0.1", Some("5556"), &["drone_status"]).unwrap();

    thread::sleep(Duration::from_secs(1));
    wait_joined(&mut publisher, &mut subscriber, "drone_status");

    let t0 = unix_timestamp();
    let message = format!("status update 0 at {t0}");

    let mut timer = LatencyTimer::new();
    timer.start();
    publisher.send("drone_status", &message).unwrap();
    let send_latency = timer.stop().unwrap();
    assert!(send_latency >= 0.0);

    let received = subscriber
        .recv_timeout(Duration::from_secs(5))
        .unwrap()
        .expect("no status update");
    assert_eq!(received, message);

    let sent_at: f64 = received.rsplit(' ').next().unwrap().parse().unwrap();
    assert_eq!(sent_at, t0);
    assert!(skew_from_now(sent_at) >= 0.0);
}
