//! PUB engine.
//!
//! Runs inside the process I/O runtime:
//!
//! ```text
//!   application ──outbound──▶ hub ──per-peer queue──▶ writer ──▶ subscriber
//!                              ▲
//!   accept loop ──PeerUp───────┤
//!   reader      ──Subscribe────┘
//! ```
//!
//! The hub owns the subscription index and is the only place that decides
//! which peer gets which message. Per-peer queues are bounded by the send
//! HWM; a peer whose queue is full misses the message (libzmq PUB
//! semantics) so one slow subscriber never stalls the others.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncWriteExt};
use flume::{Receiver, Sender, TrySendError};
use futures::{select, FutureExt};
use hashbrown::HashMap;
use proclink_core::index::{PeerKey, SubscriptionIndex};
use proclink_core::options::SocketOptions;
use proclink_core::socket_type::SocketType;
use proclink_core::subscription::SubscriptionEvent;
use tracing::{debug, trace, warn};

use crate::codec::ZmtpDecoder;
use crate::command::{parse_command, subscription_command};
use crate::handshake::perform_handshake_with_timeout;
use crate::transport::{BoundListener, Connection, Listener};
use crate::utils::encode_message;

const READ_CHUNK: usize = 4096;

/// Channels tying a publisher engine to its endpoint.
pub struct PublisherChannels {
    /// Encoded message bodies from the application
    pub outbound: Receiver<Bytes>,
    /// Disconnects when the endpoint is gone for good
    pub alive: Receiver<()>,
    /// Dropped once the outbound queue is drained into peer sockets
    pub done: Sender<()>,
}

enum HubEvent {
    PeerUp { key: PeerKey, queue: Sender<Vec<u8>> },
    Subscription { key: PeerKey, event: SubscriptionEvent },
    PeerDown { key: PeerKey },
}

/// Serve subscribers on `listener` until the endpoint closes.
pub async fn serve(listener: BoundListener, options: SocketOptions, channels: PublisherChannels) {
    match listener {
        BoundListener::Tcp(l) => run(l, options, channels).await,
        #[cfg(unix)]
        BoundListener::Ipc(l) => run(l, options, channels).await,
    }
}

async fn run<L: Listener>(listener: L, options: SocketOptions, channels: PublisherChannels) {
    let PublisherChannels {
        outbound,
        alive,
        done,
    } = channels;
    let (events_tx, events_rx) = flume::unbounded();

    compio::runtime::spawn(accept_loop(
        listener,
        options.clone(),
        events_tx.clone(),
        alive.clone(),
    ))
    .detach();

    // events_tx stays alive here so the hub never sees the event queue close
    hub_loop(outbound, events_rx, &alive).await;
    drop(events_tx);
    drop(done);
    debug!("[PUB] Hub stopped");
}

async fn hub_loop(outbound: Receiver<Bytes>, events: Receiver<HubEvent>, alive: &Receiver<()>) {
    let mut index = SubscriptionIndex::new();
    let mut peers: HashMap<PeerKey, Sender<Vec<u8>>> = HashMap::new();

    loop {
        select! {
            msg = outbound.recv_async().fuse() => match msg {
                Ok(body) => fan_out(&body, &index, &mut peers),
                Err(_) => {
                    debug!("[PUB] Outbound queue drained");
                    break;
                }
            },
            ev = events.recv_async().fuse() => match ev {
                Ok(HubEvent::PeerUp { key, queue }) => {
                    debug!("[PUB] Subscriber {} ready", key);
                    peers.insert(key, queue);
                }
                Ok(HubEvent::Subscription { key, event }) => {
                    trace!("[PUB] Subscriber {} {:?}", key, event);
                    match event {
                        SubscriptionEvent::Subscribe(prefix) => index.subscribe(key, prefix),
                        SubscriptionEvent::Unsubscribe(prefix) => index.unsubscribe(key, &prefix),
                    }
                }
                Ok(HubEvent::PeerDown { key }) => {
                    debug!("[PUB] Subscriber {} gone", key);
                    peers.remove(&key);
                    index.remove_peer(key);
                }
                Err(_) => break,
            },
            _ = alive.recv_async().fuse() => {
                debug!("[PUB] Endpoint closed, dropping pending messages");
                return;
            }
        }
    }

    // Linger: wait until writers have taken every queued frame.
    loop {
        peers.retain(|_, q| !q.is_disconnected());
        if peers.values().all(Sender::is_empty) {
            break;
        }
        select! {
            _ = compio::time::sleep(Duration::from_millis(1)).fuse() => {},
            _ = alive.recv_async().fuse() => return,
        }
    }
}

fn fan_out(body: &Bytes, index: &SubscriptionIndex, peers: &mut HashMap<PeerKey, Sender<Vec<u8>>>) {
    let targets = index.match_topic(body);
    if targets.is_empty() {
        trace!("[PUB] No subscriber for {} byte message", body.len());
        return;
    }

    let frame = encode_message(body);
    for key in targets {
        let result = match peers.get(&key) {
            Some(queue) => queue.try_send(frame.clone()),
            None => continue,
        };
        match result {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                trace!("[PUB] Subscriber {} at HWM, message dropped", key);
            }
            Err(TrySendError::Disconnected(_)) => {
                peers.remove(&key);
            }
        }
    }
}

async fn accept_loop<L: Listener>(
    listener: L,
    options: SocketOptions,
    events: Sender<HubEvent>,
    alive: Receiver<()>,
) {
    let mut next_key: PeerKey = 0;

    loop {
        select! {
            conn = listener.accept_peer(&options).fuse() => match conn {
                Ok(stream) => {
                    next_key += 1;
                    trace!("[PUB] Accepted connection {}", next_key);
                    compio::runtime::spawn(peer_session(
                        stream,
                        next_key,
                        options.clone(),
                        events.clone(),
                        alive.clone(),
                    ))
                    .detach();
                }
                Err(e) => {
                    warn!("[PUB] Accept failed: {}", e);
                    compio::time::sleep(Duration::from_millis(10)).await;
                }
            },
            _ = alive.recv_async().fuse() => {
                debug!("[PUB] Listener closed");
                break;
            }
        }
    }
}

async fn peer_session<S: Connection>(
    mut stream: S,
    key: PeerKey,
    options: SocketOptions,
    events: Sender<HubEvent>,
    alive: Receiver<()>,
) {
    let handshake = select! {
        res = perform_handshake_with_timeout(
            &mut stream,
            SocketType::Pub,
            options.effective_handshake_timeout(),
        ).fuse() => res,
        _ = alive.recv_async().fuse() => return,
    };
    if let Err(e) = handshake {
        debug!("[PUB] Subscriber {} handshake failed: {}", key, e);
        return;
    }

    let reader = match stream.duplicate() {
        Ok(reader) => reader,
        Err(e) => {
            warn!("[PUB] Subscriber {} could not split stream: {}", key, e);
            return;
        }
    };

    let (queue_tx, queue_rx) = flume::bounded::<Vec<u8>>(options.send_hwm.max(1));
    if events
        .send(HubEvent::PeerUp {
            key,
            queue: queue_tx,
        })
        .is_err()
    {
        return;
    }

    compio::runtime::spawn(subscription_reader(
        reader,
        key,
        options.max_msg_size,
        events.clone(),
        alive.clone(),
    ))
    .detach();

    loop {
        let frame = select! {
            f = queue_rx.recv_async().fuse() => match f {
                Ok(frame) => frame,
                Err(_) => break,
            },
            _ = alive.recv_async().fuse() => break,
        };
        let written = select! {
            w = stream.write_all(frame).fuse() => w,
            _ = alive.recv_async().fuse() => break,
        };
        let BufResult(res, _) = written;
        if let Err(e) = res {
            debug!("[PUB] Subscriber {} write failed: {}", key, e);
            let _ = events.send(HubEvent::PeerDown { key });
            break;
        }
    }
}

/// Reads subscription messages from one subscriber until it goes away.
async fn subscription_reader<S: Connection>(
    mut stream: S,
    key: PeerKey,
    max_msg_size: Option<usize>,
    events: Sender<HubEvent>,
    alive: Receiver<()>,
) {
    let mut decoder = ZmtpDecoder::with_max_frame_size(max_msg_size);
    let mut pending = BytesMut::with_capacity(READ_CHUNK);
    let mut continuation = false;

    loop {
        let read = select! {
            r = stream.read(Vec::with_capacity(READ_CHUNK)).fuse() => r,
            _ = alive.recv_async().fuse() => return,
        };
        match read {
            BufResult(Ok(0), _) => {
                debug!("[PUB] Subscriber {} disconnected", key);
                break;
            }
            BufResult(Ok(n), buf) => pending.extend_from_slice(&buf[..n]),
            BufResult(Err(e), _) => {
                debug!("[PUB] Subscriber {} read error: {}", key, e);
                break;
            }
        }

        loop {
            let frame = match decoder.decode(&mut pending) {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!("[PUB] Subscriber {} protocol error: {}", key, e);
                    let _ = events.send(HubEvent::PeerDown { key });
                    return;
                }
            };

            let event = if frame.is_command() {
                parse_command(&frame.payload)
                    .ok()
                    .and_then(|cmd| subscription_command(&cmd))
            } else {
                // Only the first frame of a message can be a subscription.
                let first = !continuation;
                continuation = frame.more();
                if first {
                    SubscriptionEvent::from_message(&frame.payload)
                } else {
                    None
                }
            };

            match event {
                Some(event) => {
                    if events.send(HubEvent::Subscription { key, event }).is_err() {
                        return;
                    }
                }
                None => trace!("[PUB] Subscriber {} sent ignorable frame", key),
            }
        }
    }

    let _ = events.send(HubEvent::PeerDown { key });
}
