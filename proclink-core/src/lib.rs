//! ProcLink Core
//!
//! Transport-level building blocks shared by the wire layer and the public
//! API:
//! - Address resolution for `tcp` / `ipc` endpoints (`endpoint`)
//! - Error types (`error`)
//! - Subscriber topic filters and subscription messages (`subscription`)
//! - Publisher-side subscription index (`index`)
//! - Socket options and reconnect backoff (`options`, `reconnect`)
//! - TCP tuning and Unix domain socket helpers (`tcp`, `ipc`)

// The tcp module needs raw fd/socket access for socket configuration
#![cfg_attr(not(test), deny(unsafe_code))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod endpoint;
pub mod error;
pub mod index;
pub mod options;
pub mod reconnect;
pub mod socket_type;
pub mod subscription;
pub mod tcp;

#[cfg(unix)]
pub mod ipc;

pub mod prelude {
    pub use crate::endpoint::{resolve, Endpoint, EndpointAddress, TransportKind};
    pub use crate::error::{MessagingError, Result};
    pub use crate::index::{PeerKey, SubscriptionIndex};
    pub use crate::options::SocketOptions;
    pub use crate::reconnect::ReconnectState;
    pub use crate::socket_type::SocketType;
    pub use crate::subscription::{SubscriptionEvent, SubscriptionFilter};
    pub use crate::tcp::tune_tcp_stream;

    #[cfg(unix)]
    pub use crate::ipc;
}
