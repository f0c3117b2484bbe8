//! # ProcLink
//!
//! Topic-based publish/subscribe between local processes, plus the process
//! supervision and latency helpers needed to run a set of cooperating
//! workers.
//!
//! ## Architecture
//!
//! - **`proclink-core`**: addresses, errors, subscription filters, options
//! - **`proclink-zmtp`**: ZMTP 3.0 framing and the PUB / SUB engines
//! - **`proclink`**: synchronous endpoints, supervisor, timer (this crate)
//!
//! Every process runs one background I/O thread that owns all of its
//! sockets; endpoints hand messages to it over bounded queues.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use proclink::bus::{create_publisher, create_subscriber};
//! use proclink::benchmark::{skew_from_now, unix_timestamp};
//!
//! # fn main() -> proclink::Result<()> {
//! let mut publisher = create_publisher("tcp", "*", Some("5556"))?;
//! let mut subscriber = create_subscriber("tcp", "127.0.0.1", Some("5556"), &["drone_status"])?;
//!
//! let t0 = unix_timestamp();
//! publisher.send("drone_status", &format!("status update 0 at {t0}"))?;
//!
//! let payload = subscriber.recv()?;
//! println!("{payload}, {:.6}s behind", skew_from_now(t0));
//! # Ok(())
//! # }
//! ```
//!
//! ## Transports
//!
//! - **`tcp`**: `host:port`, `*` binds every interface, port 0 picks one
//! - **`ipc`**: Unix domain socket at a filesystem path (unix only)
//!
//! Delivery is best-effort: a subscriber only sees messages published after
//! its subscription reached the publisher, and full queues drop messages.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod benchmark;
pub mod bus;
pub mod context;
pub mod dev_tracing;
pub mod signal;
pub mod supervisor;

pub use bytes::Bytes;
pub use proclink_core::endpoint::{resolve, Endpoint, EndpointAddress, TransportKind};
pub use proclink_core::error::{MessagingError, Result};
pub use proclink_core::options::SocketOptions;
pub use proclink_core::subscription::SubscriptionFilter;
pub use proclink_zmtp::envelope::Envelope;

/// Common imports.
pub mod prelude {
    pub use crate::benchmark::{skew_from_now, unix_timestamp, LatencyTimer, TimerError};
    pub use crate::bus::{create_publisher, create_subscriber, Publisher, Subscriber};
    pub use crate::supervisor::{ProcessSupervisor, SupervisorError, WorkerSpec};
    pub use crate::{Envelope, EndpointAddress, MessagingError, Result, SocketOptions, TransportKind};
}
