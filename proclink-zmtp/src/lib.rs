//! # ProcLink ZMTP
//!
//! ZMTP 3.0 wire layer for ProcLink publish/subscribe.
//!
//! ## Overview
//!
//! - **PUB engine** (`publisher`): accepts subscribers, tracks their
//!   subscriptions and fans messages out to the matching ones
//! - **SUB engine** (`subscriber`): connects with reconnect backoff,
//!   announces its filter and delivers matching messages
//! - **Envelope** (`envelope`): the `"<topic> <payload>"` message body
//!
//! Both engines run as tasks on a compio runtime and talk to their owning
//! endpoint through flume channels. The NULL mechanism handshake and framing
//! are compatible with libzmq PUB/SUB sockets, so processes built on pyzmq
//! can sit on either side.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]

mod command;
mod greeting;
mod multipart;

pub mod codec;
pub mod envelope;
pub mod handshake;
pub mod publisher;
pub mod subscriber;
pub mod transport;
pub mod utils;

pub use envelope::Envelope;
pub use publisher::PublisherChannels;
pub use subscriber::SubscriberChannels;
pub use transport::BoundListener;
