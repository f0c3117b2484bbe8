//! SUB engine.
//!
//! Connects to a publisher, announces the subscription filter, and forwards
//! matching message bodies to the endpoint's inbound queue. The connection
//! is re-established with backoff whenever it cannot be made or is lost, so
//! a subscriber may start before its publisher exists.

use bytes::{Bytes, BytesMut};
use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncWriteExt};
use flume::{Receiver, Sender, TrySendError};
use futures::{select, FutureExt};
use proclink_core::endpoint::Endpoint;
use proclink_core::options::SocketOptions;
use proclink_core::reconnect::ReconnectState;
use proclink_core::socket_type::SocketType;
use proclink_core::subscription::SubscriptionFilter;
use tracing::{debug, trace, warn};

use crate::codec::ZmtpDecoder;
use crate::handshake::perform_handshake_with_timeout;
use crate::multipart::MultipartBuffer;
use crate::transport::{dial, Connection, Dialed};
use crate::utils::encode_message;

const READ_CHUNK: usize = 8192;
const MAX_FRAMES_PER_MESSAGE: usize = 64;

/// Channels tying a subscriber engine to its endpoint.
pub struct SubscriberChannels {
    /// Matching message bodies for the application
    pub inbound: Sender<Bytes>,
    /// Disconnects when the endpoint closes
    pub alive: Receiver<()>,
}

enum SessionEnd {
    /// Connection lost or refused; try again after a backoff delay
    Retry,
    /// Endpoint closed
    Stop,
}

/// Keep a subscription to `endpoint` alive until the endpoint closes.
pub async fn run(
    endpoint: Endpoint,
    filter: SubscriptionFilter,
    options: SocketOptions,
    channels: SubscriberChannels,
) {
    let SubscriberChannels { inbound, alive } = channels;
    let mut backoff = ReconnectState::new(&options);

    loop {
        let attempt = select! {
            r = dial(&endpoint, &options).fuse() => r,
            _ = alive.recv_async().fuse() => break,
        };

        let outcome = match attempt {
            Ok(Dialed::Tcp(stream)) => {
                session(stream, &filter, &options, &inbound, &alive, &mut backoff).await
            }
            #[cfg(unix)]
            Ok(Dialed::Ipc(stream)) => {
                session(stream, &filter, &options, &inbound, &alive, &mut backoff).await
            }
            Err(e) => {
                trace!("[SUB] Connect to {} failed: {}", endpoint, e);
                SessionEnd::Retry
            }
        };

        if let SessionEnd::Stop = outcome {
            break;
        }

        let delay = backoff.next_delay();
        trace!("[SUB] Reconnecting to {} in {:?}", endpoint, delay);
        select! {
            _ = compio::time::sleep(delay).fuse() => {},
            _ = alive.recv_async().fuse() => break,
        }
    }

    debug!("[SUB] Stopped subscribing to {}", endpoint);
}

async fn session<S: Connection>(
    mut stream: S,
    filter: &SubscriptionFilter,
    options: &SocketOptions,
    inbound: &Sender<Bytes>,
    alive: &Receiver<()>,
    backoff: &mut ReconnectState,
) -> SessionEnd {
    let handshake = select! {
        r = perform_handshake_with_timeout(
            &mut stream,
            SocketType::Sub,
            options.effective_handshake_timeout(),
        ).fuse() => r,
        _ = alive.recv_async().fuse() => return SessionEnd::Stop,
    };
    if let Err(e) = handshake {
        debug!("[SUB] Handshake failed: {}", e);
        return SessionEnd::Retry;
    }
    backoff.reset();

    for msg in filter.subscribe_messages() {
        let BufResult(res, _) = stream.write_all(encode_message(&msg)).await;
        if let Err(e) = res {
            debug!("[SUB] Sending subscription failed: {}", e);
            return SessionEnd::Retry;
        }
    }
    debug!("[SUB] Connected, {} subscription(s) sent", filter.len().max(1));

    let mut decoder = ZmtpDecoder::with_max_frame_size(options.max_msg_size);
    let mut assembler = MultipartBuffer::new(
        MAX_FRAMES_PER_MESSAGE,
        options.max_msg_size.unwrap_or(usize::MAX),
    );
    let mut pending = BytesMut::with_capacity(READ_CHUNK);

    loop {
        let read = select! {
            r = stream.read(Vec::with_capacity(READ_CHUNK)).fuse() => r,
            _ = alive.recv_async().fuse() => return SessionEnd::Stop,
        };
        match read {
            BufResult(Ok(0), _) => {
                debug!("[SUB] Publisher disconnected");
                return SessionEnd::Retry;
            }
            BufResult(Ok(n), buf) => pending.extend_from_slice(&buf[..n]),
            BufResult(Err(e), _) => {
                debug!("[SUB] Read error: {}", e);
                return SessionEnd::Retry;
            }
        }

        loop {
            let frame = match decoder.decode(&mut pending) {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!("[SUB] Protocol error: {}", e);
                    return SessionEnd::Retry;
                }
            };

            if frame.is_command() {
                // PING and friends carry nothing for a subscriber.
                trace!("[SUB] Ignoring command frame");
                continue;
            }

            let body = match assembler.push_frame(frame) {
                Ok(Some(body)) => body,
                Ok(None) => continue,
                Err(e) => {
                    warn!("[SUB] Dropping oversized message: {:?}", e);
                    continue;
                }
            };

            if !filter.matches_bytes(&body) {
                trace!("[SUB] Filtered out {} byte message", body.len());
                continue;
            }

            match inbound.try_send(body) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    trace!("[SUB] Receive queue at HWM, message dropped");
                }
                Err(TrySendError::Disconnected(_)) => return SessionEnd::Stop,
            }
        }
    }
}
