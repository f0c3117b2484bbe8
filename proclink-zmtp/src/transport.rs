//! Stream and listener plumbing shared by the publisher and subscriber
//! engines, so both run the same code over TCP and Unix domain sockets.

use std::io;

use compio::io::{AsyncRead, AsyncWrite};
use compio::net::{TcpListener, TcpStream};
use compio::runtime::TryClone;
use proclink_core::endpoint::Endpoint;
use proclink_core::options::SocketOptions;
use proclink_core::tcp::tune_tcp_stream;

#[cfg(unix)]
use compio::net::{UnixListener, UnixStream};
#[cfg(unix)]
use proclink_core::ipc::{self, SocketFileGuard};

/// A connected byte stream that can be split into a reader and a writer.
pub trait Connection: AsyncRead + AsyncWrite + Sized + 'static {
    /// Second handle on the same socket.
    fn duplicate(&self) -> io::Result<Self>;
}

impl Connection for TcpStream {
    fn duplicate(&self) -> io::Result<Self> {
        self.try_clone()
    }
}

#[cfg(unix)]
impl Connection for UnixStream {
    fn duplicate(&self) -> io::Result<Self> {
        self.try_clone()
    }
}

/// A bound listening socket.
#[allow(async_fn_in_trait)]
pub trait Listener: 'static {
    type Conn: Connection;

    /// Accept one peer and apply per-connection socket options.
    async fn accept_peer(&self, options: &SocketOptions) -> io::Result<Self::Conn>;
}

impl Listener for TcpListener {
    type Conn = TcpStream;

    async fn accept_peer(&self, options: &SocketOptions) -> io::Result<TcpStream> {
        let (stream, _addr) = self.accept().await?;
        tune_tcp_stream(&stream, options)?;
        Ok(stream)
    }
}

/// Unix listener that removes its socket file when dropped.
#[cfg(unix)]
pub struct IpcListener {
    listener: UnixListener,
    _guard: SocketFileGuard,
}

#[cfg(unix)]
impl Listener for IpcListener {
    type Conn = UnixStream;

    async fn accept_peer(&self, _options: &SocketOptions) -> io::Result<UnixStream> {
        ipc::accept(&self.listener).await
    }
}

/// Listener for either transport, plus the endpoint it actually bound.
pub enum BoundListener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Ipc(IpcListener),
}

impl BoundListener {
    /// Bind `endpoint`. TCP port 0 picks an ephemeral port; the concrete
    /// address is returned alongside the listener.
    pub async fn bind(endpoint: &Endpoint) -> io::Result<(Self, Endpoint)> {
        match endpoint {
            Endpoint::Tcp(addr) => {
                let listener = TcpListener::bind(*addr).await?;
                let local = Endpoint::Tcp(listener.local_addr()?);
                Ok((Self::Tcp(listener), local))
            }
            #[cfg(unix)]
            Endpoint::Ipc(path) => {
                let (listener, guard) = ipc::bind(path).await?;
                Ok((
                    Self::Ipc(IpcListener {
                        listener,
                        _guard: guard,
                    }),
                    endpoint.clone(),
                ))
            }
        }
    }
}

/// Connected stream for either transport.
pub enum Dialed {
    Tcp(TcpStream),
    #[cfg(unix)]
    Ipc(UnixStream),
}

/// Connect to `endpoint` once.
pub async fn dial(endpoint: &Endpoint, options: &SocketOptions) -> io::Result<Dialed> {
    match endpoint {
        Endpoint::Tcp(addr) => {
            let stream = TcpStream::connect(*addr).await?;
            tune_tcp_stream(&stream, options)?;
            Ok(Dialed::Tcp(stream))
        }
        #[cfg(unix)]
        Endpoint::Ipc(path) => Ok(Dialed::Ipc(ipc::connect(path).await?)),
    }
}
