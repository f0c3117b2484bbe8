//! Publisher and subscriber endpoints.
//!
//! Endpoints are synchronous handles. The sockets behind them live on the
//! process I/O thread (see [`crate::context`]); messages cross over through
//! bounded queues sized by the send and receive high-water marks.
//!
//! ```rust,no_run
//! use proclink::bus::{create_publisher, create_subscriber};
//!
//! # fn main() -> proclink::Result<()> {
//! let mut publisher = create_publisher("tcp", "127.0.0.1", Some("5556"))?;
//! let mut subscriber = create_subscriber("tcp", "127.0.0.1", Some("5556"), &["drone_status"])?;
//!
//! publisher.send("drone_status", "status update 0 at 1.0")?;
//! let payload = subscriber.recv()?;
//! # let _ = payload;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use bytes::Bytes;
use flume::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use proclink_core::endpoint::{Endpoint, EndpointAddress};
use proclink_core::error::{MessagingError, Result};
use proclink_core::options::SocketOptions;
use proclink_core::subscription::SubscriptionFilter;
use proclink_zmtp::envelope::{self, Envelope};
use proclink_zmtp::{PublisherChannels, SubscriberChannels};
use tracing::debug;

use crate::context::Context;

/// Role of an endpoint on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Binds and fans messages out
    Publisher,
    /// Connects and receives matching messages
    Subscriber,
}

/// Lifecycle of an endpoint. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Built but not yet attached to the I/O engine
    Created,
    /// Bound or connecting; send/receive allowed
    Open,
    /// Released; send/receive fail with [`MessagingError::Closed`]
    Closed,
}

/// Publishing side of the bus.
pub struct Publisher {
    address: EndpointAddress,
    local: Endpoint,
    options: SocketOptions,
    state: EndpointState,
    outbound: Option<Sender<Bytes>>,
    alive: Option<Sender<()>>,
    done: Receiver<()>,
    context: Option<Context>,
}

impl Publisher {
    /// Bind a publisher with default options.
    pub fn bind(address: &EndpointAddress) -> Result<Self> {
        Self::bind_with_options(address, SocketOptions::default())
    }

    /// Bind a publisher.
    ///
    /// TCP port 0 binds an ephemeral port; see [`Publisher::last_endpoint`].
    pub fn bind_with_options(address: &EndpointAddress, options: SocketOptions) -> Result<Self> {
        let display = address.resolve()?;
        let endpoint = address.to_endpoint().map_err(|e| match e {
            MessagingError::Io(source) => MessagingError::bind(&display, source),
            other => other,
        })?;

        let context = Context::acquire()?;
        let (outbound_tx, outbound_rx) = flume::bounded(options.send_hwm.max(1));
        let (alive_tx, alive_rx) = flume::bounded(1);
        let (done_tx, done_rx) = flume::bounded(1);

        let mut publisher = Self {
            address: address.clone(),
            local: endpoint.clone(),
            options: options.clone(),
            state: EndpointState::Created,
            outbound: Some(outbound_tx),
            alive: Some(alive_tx),
            done: done_rx,
            context: None,
        };

        publisher.local = context.bind(
            endpoint,
            options,
            PublisherChannels {
                outbound: outbound_rx,
                alive: alive_rx,
                done: done_tx,
            },
        )?;
        publisher.context = Some(context);
        publisher.state = EndpointState::Open;

        debug!("[PUB] Bound {} ({})", publisher.address, publisher.local);
        Ok(publisher)
    }

    /// Publish `payload` on `topic`, waiting while the send queue is full.
    pub fn send(&mut self, topic: &str, payload: &str) -> Result<()> {
        self.send_with(topic, payload, false)
    }

    /// Publish without blocking; fails with [`MessagingError::WouldBlock`]
    /// when the send queue is at its high-water mark.
    pub fn try_send(&mut self, topic: &str, payload: &str) -> Result<()> {
        self.send_with(topic, payload, true)
    }

    /// Publish in blocking or non-blocking mode.
    pub fn send_with(&mut self, topic: &str, payload: &str, non_blocking: bool) -> Result<()> {
        let outbound = match (&self.state, &self.outbound) {
            (EndpointState::Open, Some(outbound)) => outbound,
            _ => return Err(MessagingError::Closed),
        };
        let body = envelope::encode(topic, payload)?;

        if non_blocking {
            outbound.try_send(body).map_err(|e| match e {
                TrySendError::Full(_) => MessagingError::WouldBlock,
                TrySendError::Disconnected(_) => MessagingError::ContextTerminated,
            })
        } else {
            outbound
                .send(body)
                .map_err(|_| MessagingError::ContextTerminated)
        }
    }

    /// Concrete endpoint the publisher is bound to.
    pub fn last_endpoint(&self) -> &Endpoint {
        &self.local
    }

    /// Address the publisher was created with.
    pub fn address(&self) -> &EndpointAddress {
        &self.address
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EndpointState {
        self.state
    }

    /// Always the same for a given endpoint type.
    pub fn role(&self) -> Role {
        Role::Publisher
    }

    /// Release the socket.
    ///
    /// Queued messages get up to the linger period to reach connected
    /// subscribers. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.state == EndpointState::Closed {
            return;
        }
        self.state = EndpointState::Closed;

        drop(self.outbound.take());
        if let Some(linger) = self.options.effective_linger() {
            if let Err(RecvTimeoutError::Timeout) = self.done.recv_timeout(linger) {
                debug!("[PUB] Linger expired on {}, dropping pending messages", self.local);
            }
        }
        drop(self.alive.take());
        drop(self.context.take());
        debug!("[PUB] Closed {}", self.local);
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("address", &self.address)
            .field("local", &self.local)
            .field("state", &self.state)
            .finish()
    }
}

/// Subscribing side of the bus.
pub struct Subscriber {
    address: EndpointAddress,
    filter: SubscriptionFilter,
    state: EndpointState,
    inbound: Receiver<Bytes>,
    alive: Option<Sender<()>>,
    context: Option<Context>,
}

impl Subscriber {
    /// Connect with default options.
    ///
    /// An empty `topics` list receives every message.
    pub fn connect<S: AsRef<str>>(address: &EndpointAddress, topics: &[S]) -> Result<Self> {
        Self::connect_with_options(address, topics, SocketOptions::default())
    }

    /// Start connecting to `address` with `topics` installed.
    ///
    /// Returns immediately; the connection is made, and remade, in the
    /// background. Messages published before the subscription reaches the
    /// publisher are not delivered.
    pub fn connect_with_options<S: AsRef<str>>(
        address: &EndpointAddress,
        topics: &[S],
        options: SocketOptions,
    ) -> Result<Self> {
        address.resolve()?;
        let endpoint = address.to_endpoint()?;
        let filter = SubscriptionFilter::new(topics);

        let context = Context::acquire()?;
        let (inbound_tx, inbound_rx) = flume::bounded(options.recv_hwm.max(1));
        let (alive_tx, alive_rx) = flume::bounded(1);

        let mut subscriber = Self {
            address: address.clone(),
            filter: filter.clone(),
            state: EndpointState::Created,
            inbound: inbound_rx,
            alive: Some(alive_tx),
            context: None,
        };

        context.connect(
            endpoint,
            filter,
            options,
            SubscriberChannels {
                inbound: inbound_tx,
                alive: alive_rx,
            },
        )?;
        subscriber.context = Some(context);
        subscriber.state = EndpointState::Open;

        debug!(
            "[SUB] Connecting to {} with {} topic(s)",
            subscriber.address,
            subscriber.filter.len()
        );
        Ok(subscriber)
    }

    /// Payload of the next matching message, blocking until one arrives.
    pub fn recv(&mut self) -> Result<String> {
        self.recv_envelope().map(|env| env.payload)
    }

    /// Payload of the next matching message, or [`MessagingError::WouldBlock`].
    pub fn try_recv(&mut self) -> Result<String> {
        self.try_recv_envelope().map(|env| env.payload)
    }

    /// Receive in blocking or non-blocking mode.
    pub fn recv_with(&mut self, non_blocking: bool) -> Result<String> {
        if non_blocking {
            self.try_recv()
        } else {
            self.recv()
        }
    }

    /// Next matching message with its topic.
    pub fn recv_envelope(&mut self) -> Result<Envelope> {
        self.ensure_open()?;
        let body = self
            .inbound
            .recv()
            .map_err(|_| MessagingError::ContextTerminated)?;
        Envelope::decode(&body)
    }

    /// Next matching message with its topic, without blocking.
    pub fn try_recv_envelope(&mut self) -> Result<Envelope> {
        self.ensure_open()?;
        let body = self.inbound.try_recv().map_err(|e| match e {
            TryRecvError::Empty => MessagingError::WouldBlock,
            TryRecvError::Disconnected => MessagingError::ContextTerminated,
        })?;
        Envelope::decode(&body)
    }

    /// Wait up to `timeout` for the next matching payload.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<String>> {
        self.ensure_open()?;
        match self.inbound.recv_timeout(timeout) {
            Ok(body) => Envelope::decode(&body).map(|env| Some(env.payload)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(MessagingError::ContextTerminated),
        }
    }

    /// Address the subscriber connects to.
    pub fn address(&self) -> &EndpointAddress {
        &self.address
    }

    /// Installed topic prefixes.
    pub fn filter(&self) -> &SubscriptionFilter {
        &self.filter
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EndpointState {
        self.state
    }

    /// Always [`Role::Subscriber`].
    pub fn role(&self) -> Role {
        Role::Subscriber
    }

    /// Disconnect. Unread messages are discarded. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.state == EndpointState::Closed {
            return;
        }
        self.state = EndpointState::Closed;
        drop(self.alive.take());
        drop(self.context.take());
        while self.inbound.try_recv().is_ok() {}
        debug!("[SUB] Closed {}", self.address);
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            EndpointState::Open => Ok(()),
            _ => Err(MessagingError::Closed),
        }
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("address", &self.address)
            .field("filter", &self.filter)
            .field("state", &self.state)
            .finish()
    }
}

/// Bind a publisher from a `(protocol, host or path, port)` triple.
///
/// `protocol` is `"tcp"` or `"ipc"`; `tcp` requires a port.
pub fn create_publisher(protocol: &str, address: &str, port: Option<&str>) -> Result<Publisher> {
    let address = EndpointAddress::from_parts(protocol, address, port)?;
    Publisher::bind(&address)
}

/// Connect a subscriber from a `(protocol, host or path, port)` triple.
pub fn create_subscriber<S: AsRef<str>>(
    protocol: &str,
    address: &str,
    port: Option<&str>,
    topics: &[S],
) -> Result<Subscriber> {
    let address = EndpointAddress::from_parts(protocol, address, port)?;
    Subscriber::connect(&address, topics)
}
