//! Process-local transport context.
//!
//! Every endpoint in a process shares one background I/O thread running a
//! single-threaded compio runtime. The thread is started by the first
//! endpoint and stopped when the last one closes. A context never crosses
//! a `fork`: a child process that finds its parent's context starts a fresh
//! one.

use std::io;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use flume::Sender;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use proclink_core::endpoint::Endpoint;
use proclink_core::error::{MessagingError, Result};
use proclink_core::options::SocketOptions;
use proclink_core::subscription::SubscriptionFilter;
use proclink_zmtp::{publisher, subscriber, BoundListener, PublisherChannels, SubscriberChannels};
use tracing::{debug, error, warn};

const IO_THREAD_NAME: &str = "proclink-io";

static CURRENT: Lazy<Mutex<Weak<ContextInner>>> = Lazy::new(|| Mutex::new(Weak::new()));

enum IoCommand {
    Bind {
        endpoint: Endpoint,
        options: SocketOptions,
        channels: PublisherChannels,
        reply: Sender<io::Result<Endpoint>>,
    },
    Connect {
        endpoint: Endpoint,
        filter: SubscriptionFilter,
        options: SocketOptions,
        channels: SubscriberChannels,
    },
}

struct ContextInner {
    commands: Option<Sender<IoCommand>>,
    thread: Option<JoinHandle<()>>,
    pid: u32,
}

/// Handle on the process I/O engine. Cheap to clone.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("pid", &self.inner.pid).finish()
    }
}

impl Context {
    /// Join the running context or start one.
    pub fn acquire() -> Result<Self> {
        let mut current = CURRENT.lock();
        if let Some(inner) = current.upgrade() {
            if inner.pid == std::process::id() {
                return Ok(Self { inner });
            }
        }

        let inner = Arc::new(ContextInner::start()?);
        *current = Arc::downgrade(&inner);
        Ok(Self { inner })
    }

    /// Whether this process currently has a live context.
    pub fn is_active() -> bool {
        CURRENT
            .lock()
            .upgrade()
            .is_some_and(|inner| inner.pid == std::process::id())
    }

    /// Bind a publisher listener and start serving it.
    ///
    /// Returns the concrete endpoint, which differs from `endpoint` when TCP
    /// port 0 was requested.
    pub(crate) fn bind(
        &self,
        endpoint: Endpoint,
        options: SocketOptions,
        channels: PublisherChannels,
    ) -> Result<Endpoint> {
        let (reply_tx, reply_rx) = flume::bounded(1);
        let display = endpoint.to_string();
        self.submit(IoCommand::Bind {
            endpoint,
            options,
            channels,
            reply: reply_tx,
        })?;
        reply_rx
            .recv()
            .map_err(|_| MessagingError::ContextTerminated)?
            .map_err(|e| MessagingError::bind(display, e))
    }

    /// Start a subscriber engine.
    pub(crate) fn connect(
        &self,
        endpoint: Endpoint,
        filter: SubscriptionFilter,
        options: SocketOptions,
        channels: SubscriberChannels,
    ) -> Result<()> {
        self.submit(IoCommand::Connect {
            endpoint,
            filter,
            options,
            channels,
        })
    }

    fn submit(&self, cmd: IoCommand) -> Result<()> {
        self.inner
            .commands
            .as_ref()
            .ok_or(MessagingError::ContextTerminated)?
            .send(cmd)
            .map_err(|_| MessagingError::ContextTerminated)
    }
}

impl ContextInner {
    fn start() -> Result<Self> {
        let (commands_tx, commands_rx) = flume::unbounded();
        let (ready_tx, ready_rx) = flume::bounded(1);

        let thread = thread::Builder::new()
            .name(IO_THREAD_NAME.to_string())
            .spawn(move || io_thread(commands_rx, ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e.into());
            }
            Err(_) => {
                let _ = thread.join();
                return Err(MessagingError::ContextTerminated);
            }
        }

        debug!("[IO] Context started");
        Ok(Self {
            commands: Some(commands_tx),
            thread: Some(thread),
            pid: std::process::id(),
        })
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        // Closing the command queue ends the runtime loop.
        drop(self.commands.take());

        let Some(thread) = self.thread.take() else {
            return;
        };
        if self.pid != std::process::id() {
            // Inherited across fork: the thread does not exist here.
            return;
        }
        if thread.thread().id() == thread::current().id() {
            return;
        }
        if thread.join().is_err() {
            warn!("[IO] I/O thread panicked");
        }
        debug!("[IO] Context released");
    }
}

fn io_thread(commands: flume::Receiver<IoCommand>, ready: Sender<io::Result<()>>) {
    let rt = match compio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("[IO] Failed to create runtime: {}", e);
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    rt.block_on(async move {
        while let Ok(cmd) = commands.recv_async().await {
            match cmd {
                IoCommand::Bind {
                    endpoint,
                    options,
                    channels,
                    reply,
                } => match BoundListener::bind(&endpoint).await {
                    Ok((listener, local)) => {
                        debug!("[IO] Publisher bound to {}", local);
                        let _ = reply.send(Ok(local));
                        compio::runtime::spawn(publisher::serve(listener, options, channels))
                            .detach();
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                },
                IoCommand::Connect {
                    endpoint,
                    filter,
                    options,
                    channels,
                } => {
                    debug!("[IO] Subscriber connecting to {}", endpoint);
                    compio::runtime::spawn(subscriber::run(endpoint, filter, options, channels))
                        .detach();
                }
            }
        }
        debug!("[IO] Command queue closed, shutting down");
    });
}
