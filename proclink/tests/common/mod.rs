#![allow(dead_code)]

use std::time::{Duration, Instant};

use proclink::bus::{Publisher, Subscriber};
use proclink::Envelope;

/// Publish warm-up messages on `topic` until the subscriber sees one, then drain.
///
/// Covers the slow-joiner window between connect and the subscription
/// reaching the publisher.
pub fn wait_joined(publisher: &mut Publisher, subscriber: &mut Subscriber, topic: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        publisher.send(topic, "warmup").unwrap();
        if subscriber
            .recv_timeout(Duration::from_millis(20))
            .unwrap()
            .is_some()
        {
            break;
        }
        assert!(Instant::now() < deadline, "subscriber never joined");
    }

    std::thread::sleep(Duration::from_millis(50));
    while subscriber.try_recv_envelope().is_ok() {}
}

/// Next envelope, failing the test after five seconds.
pub fn next(subscriber: &mut Subscriber) -> Envelope {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match subscriber.try_recv_envelope() {
            Ok(env) => return env,
            Err(e) if e.is_recoverable() => {
                assert!(Instant::now() < deadline, "timed out waiting for message");
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(e) => panic!("recv failed: {e}"),
        }
    }
}
