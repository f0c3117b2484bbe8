//! Drone status demo.
//!
//! Without a role argument the binary supervises two copies of itself, one
//! publishing status updates and one subscribing to them:
//!
//! ```text
//! proclink-drone [tcp|ipc] [count]
//! proclink-drone publish   <tcp|ipc> [count]
//! proclink-drone subscribe <tcp|ipc> [count]
//! ```
//!
//! `count` bounds the number of messages; it defaults to running forever.

use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use proclink::dev_tracing::init_tracing;
use proclink::prelude::*;
use tracing::error;

const TOPIC: &str = "drone_status";
const TCP_PORT: &str = "5556";
const IPC_PATH: &str = "/tmp/drone_pub";

fn publisher(protocol: &str) -> Result<Publisher> {
    match protocol {
        "ipc" => create_publisher(protocol, IPC_PATH, None),
        _ => create_publisher(protocol, "*", Some(TCP_PORT)),
    }
}

fn subscriber(protocol: &str) -> Result<Subscriber> {
    match protocol {
        "ipc" => create_subscriber(protocol, IPC_PATH, None, &[TOPIC]),
        _ => create_subscriber(protocol, "127.0.0.1", Some(TCP_PORT), &[TOPIC]),
    }
}

fn publish(protocol: &str, count: Option<u64>) -> Result<()> {
    let mut socket = publisher(protocol)?;
    let mut timer = LatencyTimer::new();

    // Give the subscriber time to connect.
    thread::sleep(Duration::from_secs(1));

    let mut n = 0u64;
    while count.map_or(true, |c| n < c) {
        let sent_at = unix_timestamp();
        timer.start();
        socket.send(TOPIC, &format!("status update {n} at {sent_at}"))?;
        let latency = timer.stop().unwrap_or_default();
        println!("Sent message #{n} with latency: {latency} seconds");
        n += 1;
        thread::sleep(Duration::from_secs(1));
    }
    socket.close();
    Ok(())
}

fn subscribe(protocol: &str, count: Option<u64>) -> Result<()> {
    let mut socket = subscriber(protocol)?;

    let mut n = 0u64;
    while count.map_or(true, |c| n < c) {
        let message = socket.recv()?;
        println!("Received: {message}");
        let sent_at = message
            .rsplit(' ')
            .next()
            .and_then(|t| t.parse::<f64>().ok())
            .ok_or_else(|| MessagingError::invalid_frame(format!("no timestamp in {message:?}")))?;
        println!("Time behind real-time: {} seconds", skew_from_now(sent_at));
        n += 1;
    }
    Ok(())
}

fn supervise(protocol: &str, count: Option<&str>) -> std::result::Result<(), SupervisorError> {
    let mut supervisor = ProcessSupervisor::new();
    let args = |role: &str| {
        let mut args = vec![role.to_string(), protocol.to_string()];
        args.extend(count.map(str::to_string));
        args
    };
    supervisor.register(WorkerSpec::current_exe("publisher", args("publish"))?);
    supervisor.register(WorkerSpec::current_exe("subscriber", args("subscribe"))?);
    supervisor.run_all()
}

fn parse_count(arg: Option<&String>) -> std::result::Result<Option<u64>, String> {
    arg.map(|s| s.parse::<u64>().map_err(|e| format!("invalid count {s:?}: {e}")))
        .transpose()
}

fn main() -> ExitCode {
    init_tracing();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let outcome = match args.first().map(String::as_str) {
        Some(role @ ("publish" | "subscribe")) => {
            let protocol = args.get(1).map_or("tcp", String::as_str);
            match parse_count(args.get(2)) {
                Ok(count) if role == "publish" => publish(protocol, count).map_err(|e| e.to_string()),
                Ok(count) => subscribe(protocol, count).map_err(|e| e.to_string()),
                Err(e) => Err(e),
            }
        }
        protocol => {
            let protocol = protocol.unwrap_or("tcp");
            match parse_count(args.get(1)) {
                Ok(_) => supervise(protocol, args.get(1).map(String::as_str)).map_err(|e| e.to_string()),
                Err(e) => Err(e),
            }
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("proclink-drone: {e}");
            ExitCode::FAILURE
        }
    }
}
