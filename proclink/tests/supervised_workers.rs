//! Supervisor driving real publisher / subscriber worker processes.
#![cfg(unix)]

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use proclink::supervisor::{ProcessSupervisor, SupervisorError, WorkerSpec, WorkerStatus};

const DRONE: &str = env!("CARGO_BIN_EXE_proclink-drone");

fn supervisor() -> ProcessSupervisor {
    ProcessSupervisor::new()
        .with_signal_handling(false)
        .with_grace_period(Duration::from_millis(500))
}

#[test]
fn test_publisher_and_subscriber_workers_complete() {
    let mut sup = supervisor();
    let publisher = sup.register(WorkerSpec::new("publisher", DRONE).args(["publish", "ipc", "2"]));
    let subscriber =
        sup.register(WorkerSpec::new("subscriber", DRONE).args(["subscribe", "ipc", "2"]));

    // A lost message would leave the subscriber waiting forever.
    let stop = sup.stop_handle();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(30));
        stop.store(true, Ordering::SeqCst);
    });

    sup.run_all().unwrap();
    for id in [publisher, subscriber] {
        assert!(matches!(
            sup.record(id).unwrap().status,
            WorkerStatus::Exited(s) if s.success()
        ));
    }
}

#[test]
fn test_bad_worker_arguments_fail_the_group() {
    let mut sup = supervisor();
    let subscriber =
        sup.register(WorkerSpec::new("subscriber", DRONE).args(["subscribe", "tcp"]));
    sup.register(WorkerSpec::new("publisher", DRONE).args(["publish", "udp", "1"]));

    match sup.run_all() {
        Err(SupervisorError::WorkerFailed { name, status }) => {
            assert_eq!(name, "publisher");
            assert!(!status.success());
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        sup.record(subscriber).unwrap().status,
        WorkerStatus::Terminated(_)
    ));
}
