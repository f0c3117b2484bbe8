//! Endpoint abstraction for transport-agnostic socket addressing.
//!
//! Two layers live here:
//! - [`EndpointAddress`]: the logical `(transport kind, host-or-path, port)`
//!   triple callers hand in, rendered by [`resolve`] to `tcp://host:port` or
//!   `ipc://path`.
//! - [`Endpoint`]: the concrete address a socket binds or connects to, after
//!   host names have been resolved.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
#[cfg(unix)]
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{MessagingError, Result};

/// Host alias meaning "all interfaces" when binding.
pub const ANY_HOST: &str = "*";

/// Transport kinds a bus endpoint can run over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Network stream socket (`tcp`).
    Network,
    /// Local domain socket (`ipc`). Unix only.
    LocalDomain,
}

impl TransportKind {
    /// URI scheme used when rendering endpoints of this kind.
    pub const fn scheme(self) -> &'static str {
        match self {
            Self::Network => "tcp",
            Self::LocalDomain => "ipc",
        }
    }

    /// Whether the current platform can carry this transport.
    pub const fn is_available(self) -> bool {
        match self {
            Self::Network => true,
            Self::LocalDomain => cfg!(unix),
        }
    }

    /// Whether endpoints of this kind need a port.
    pub const fn requires_port(self) -> bool {
        matches!(self, Self::Network)
    }
}

impl FromStr for TransportKind {
    type Err = MessagingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tcp" => Ok(Self::Network),
            "ipc" => Ok(Self::LocalDomain),
            other => Err(MessagingError::invalid_protocol(format!(
                "unknown transport {other:?} (expected \"tcp\" or \"ipc\")"
            ))),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// Parse a decimal port string.
pub fn parse_port(s: &str) -> Result<u16> {
    s.trim()
        .parse::<u16>()
        .map_err(|_| MessagingError::invalid_protocol(format!("invalid port {s:?}")))
}

/// Render a logical address as an endpoint string.
///
/// `Network` requires a port and brackets IPv6 literals. `LocalDomain`
/// ignores the port and fails with [`MessagingError::UnsupportedTransport`]
/// on platforms without domain sockets.
///
/// # Examples
///
/// ```
/// use proclink_core::endpoint::{resolve, TransportKind};
///
/// let s = resolve(TransportKind::Network, "127.0.0.1", Some(5555)).unwrap();
/// assert_eq!(s, "tcp://127.0.0.1:5555");
/// ```
pub fn resolve(kind: TransportKind, host_or_path: &str, port: Option<u16>) -> Result<String> {
    match kind {
        TransportKind::Network => {
            let port = port.ok_or_else(|| {
                MessagingError::invalid_protocol("tcp endpoints require a port")
            })?;
            if host_or_path.contains(':') && !host_or_path.starts_with('[') {
                Ok(format!("tcp://[{host_or_path}]:{port}"))
            } else {
                Ok(format!("tcp://{host_or_path}:{port}"))
            }
        }
        TransportKind::LocalDomain => {
            if !kind.is_available() {
                return Err(MessagingError::UnsupportedTransport(
                    "ipc is not available on this platform".to_string(),
                ));
            }
            Ok(format!("ipc://{host_or_path}"))
        }
    }
}

/// Logical address of a bus endpoint. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointAddress {
    kind: TransportKind,
    host: String,
    port: Option<u16>,
}

impl EndpointAddress {
    pub fn new(kind: TransportKind, host_or_path: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            kind,
            host: host_or_path.into(),
            port,
        }
    }

    /// `tcp://host:port`
    pub fn network(host: impl Into<String>, port: u16) -> Self {
        Self::new(TransportKind::Network, host, Some(port))
    }

    /// `ipc://path`
    pub fn local(path: impl Into<String>) -> Self {
        Self::new(TransportKind::LocalDomain, path, None)
    }

    /// Validate a stringly-typed `(protocol, host, port)` triple.
    ///
    /// `tcp` requires a valid port; `ipc` ignores whatever port is given.
    pub fn from_parts(protocol: &str, host_or_path: &str, port: Option<&str>) -> Result<Self> {
        let kind: TransportKind = protocol.parse()?;
        if !kind.requires_port() {
            // Local-domain addresses are paths; a port means nothing there.
            return Ok(Self::new(kind, host_or_path, None));
        }
        let port = port.map(parse_port).transpose()?;
        if port.is_none() {
            return Err(MessagingError::invalid_protocol(
                "tcp endpoints require a port",
            ));
        }
        Ok(Self::new(kind, host_or_path, port))
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Endpoint string, see [`resolve`].
    pub fn resolve(&self) -> Result<String> {
        resolve(self.kind, &self.host, self.port)
    }

    /// Resolve host names into a concrete [`Endpoint`].
    ///
    /// `*` (or an empty host) means every IPv4 interface.
    pub fn to_endpoint(&self) -> Result<Endpoint> {
        match self.kind {
            TransportKind::Network => {
                let port = self.port.ok_or_else(|| {
                    MessagingError::invalid_protocol("tcp endpoints require a port")
                })?;
                let host = self.host.trim_start_matches('[').trim_end_matches(']');
                if host.is_empty() || host == ANY_HOST {
                    return Ok(Endpoint::Tcp(SocketAddr::new(
                        IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                        port,
                    )));
                }
                if let Ok(ip) = host.parse::<IpAddr>() {
                    return Ok(Endpoint::Tcp(SocketAddr::new(ip, port)));
                }
                let addr = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("no address found for {host}"),
                    )
                })?;
                Ok(Endpoint::Tcp(addr))
            }
            #[cfg(unix)]
            TransportKind::LocalDomain => Ok(Endpoint::Ipc(PathBuf::from(&self.host))),
            #[cfg(not(unix))]
            TransportKind::LocalDomain => Err(MessagingError::UnsupportedTransport(
                "ipc is not available on this platform".to_string(),
            )),
        }
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) if self.kind.requires_port() => {
                write!(f, "{}://{}:{}", self.kind, self.host, port)
            }
            _ => write!(f, "{}://{}", self.kind, self.host),
        }
    }
}

/// Concrete transport endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// TCP transport: `tcp://host:port`
    Tcp(SocketAddr),
    /// IPC transport (Unix domain socket): `ipc:///path/to/socket`
    #[cfg(unix)]
    Ipc(PathBuf),
}

impl Endpoint {
    /// Parse an endpoint from a string.
    ///
    /// Supported formats:
    /// - `tcp://127.0.0.1:5555`
    /// - `tcp://[::1]:5555` (IPv6)
    /// - `ipc:///tmp/socket.sock` (Unix only)
    pub fn parse(s: &str) -> Result<Self> {
        s.parse()
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Endpoint::Tcp(_) => TransportKind::Network,
            #[cfg(unix)]
            Endpoint::Ipc(_) => TransportKind::LocalDomain,
        }
    }

    /// Returns true if this is a TCP endpoint.
    pub fn is_tcp(&self) -> bool {
        matches!(self, Endpoint::Tcp(_))
    }

    /// Returns true if this is an IPC endpoint.
    #[cfg(unix)]
    pub fn is_ipc(&self) -> bool {
        matches!(self, Endpoint::Ipc(_))
    }
}

impl FromStr for Endpoint {
    type Err = MessagingError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(addr) = s.strip_prefix("tcp://") {
            let socket_addr = addr
                .parse::<SocketAddr>()
                .map_err(|_| MessagingError::invalid_protocol(format!("invalid tcp address {addr:?}")))?;
            Ok(Endpoint::Tcp(socket_addr))
        } else if let Some(path) = s.strip_prefix("ipc://") {
            #[cfg(unix)]
            {
                if path.is_empty() {
                    return Err(MessagingError::invalid_protocol("ipc path cannot be empty"));
                }
                Ok(Endpoint::Ipc(PathBuf::from(path)))
            }
            #[cfg(not(unix))]
            {
                let _ = path;
                Err(MessagingError::UnsupportedTransport(
                    "ipc is not available on this platform".to_string(),
                ))
            }
        } else {
            Err(MessagingError::invalid_protocol(format!(
                "invalid scheme in endpoint {s:?} (expected tcp:// or ipc://)"
            )))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
            #[cfg(unix)]
            Endpoint::Ipc(path) => write!(f, "ipc://{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_parse() {
        assert_eq!("tcp".parse::<TransportKind>().unwrap(), TransportKind::Network);
        assert_eq!("ipc".parse::<TransportKind>().unwrap(), TransportKind::LocalDomain);
        assert!(matches!(
            "udp".parse::<TransportKind>(),
            Err(MessagingError::InvalidProtocol(_))
        ));
        assert!(matches!(
            "TCP".parse::<TransportKind>(),
            Err(MessagingError::InvalidProtocol(_))
        ));
    }

    #[test]
    fn test_resolve_network() {
        let s = resolve(TransportKind::Network, "127.0.0.1", Some(5555)).unwrap();
        assert_eq!(s, "tcp://127.0.0.1:5555");
        // deterministic
        assert_eq!(s, resolve(TransportKind::Network, "127.0.0.1", Some(5555)).unwrap());
    }

    #[test]
    fn test_resolve_network_ipv6() {
        let s = resolve(TransportKind::Network, "::1", Some(7000)).unwrap();
        assert_eq!(s, "tcp://[::1]:7000");
        let s = resolve(TransportKind::Network, "[::1]", Some(7000)).unwrap();
        assert_eq!(s, "tcp://[::1]:7000");
    }

    #[test]
    fn test_resolve_network_requires_port() {
        assert!(matches!(
            resolve(TransportKind::Network, "127.0.0.1", None),
            Err(MessagingError::InvalidProtocol(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_local_ignores_port() {
        let s = resolve(TransportKind::LocalDomain, "/tmp/drone_pub", Some(1)).unwrap();
        assert_eq!(s, "ipc:///tmp/drone_pub");
    }

    #[cfg(not(unix))]
    #[test]
    fn test_resolve_local_unsupported() {
        assert!(matches!(
            resolve(TransportKind::LocalDomain, "/tmp/x", None),
            Err(MessagingError::UnsupportedTransport(_))
        ));
    }

    #[test]
    fn test_from_parts() {
        let addr = EndpointAddress::from_parts("tcp", "127.0.0.1", Some("5556")).unwrap();
        assert_eq!(addr.kind(), TransportKind::Network);
        assert_eq!(addr.port(), Some(5556));
        assert_eq!(addr.to_string(), "tcp://127.0.0.1:5556");

        assert!(matches!(
            EndpointAddress::from_parts("tcp", "127.0.0.1", Some("70000")),
            Err(MessagingError::InvalidProtocol(_))
        ));
        assert!(matches!(
            EndpointAddress::from_parts("tcp", "127.0.0.1", Some("abc")),
            Err(MessagingError::InvalidProtocol(_))
        ));
        assert!(matches!(
            EndpointAddress::from_parts("tcp", "127.0.0.1", None),
            Err(MessagingError::InvalidProtocol(_))
        ));
        assert!(matches!(
            EndpointAddress::from_parts("smtp", "127.0.0.1", Some("25")),
            Err(MessagingError::InvalidProtocol(_))
        ));
    }

    #[test]
    fn test_from_parts_ipc_ignores_port() {
        for port in [None, Some("5556"), Some("not-a-port")] {
            let addr = EndpointAddress::from_parts("ipc", "/tmp/drone_pub", port).unwrap();
            assert_eq!(addr.kind(), TransportKind::LocalDomain);
            assert_eq!(addr.port(), None);
            assert_eq!(addr.to_string(), "ipc:///tmp/drone_pub");
        }
    }

    #[test]
    fn test_to_endpoint_any_host() {
        let ep = EndpointAddress::network("*", 5555).to_endpoint().unwrap();
        assert_eq!(ep.to_string(), "tcp://0.0.0.0:5555");
    }

    #[test]
    fn test_to_endpoint_localhost_name() {
        let ep = EndpointAddress::network("localhost", 5555).to_endpoint().unwrap();
        match ep {
            Endpoint::Tcp(addr) => {
                assert!(addr.ip().is_loopback());
                assert_eq!(addr.port(), 5555);
            }
            #[cfg(unix)]
            Endpoint::Ipc(_) => panic!("expected tcp"),
        }
    }

    #[test]
    fn test_parse_tcp_ipv4() {
        let endpoint = Endpoint::parse("tcp://127.0.0.1:5555").unwrap();
        assert!(endpoint.is_tcp());
        assert_eq!(endpoint.to_string(), "tcp://127.0.0.1:5555");
    }

    #[test]
    fn test_parse_tcp_ipv6() {
        let endpoint = Endpoint::parse("tcp://[::1]:5555").unwrap();
        assert!(endpoint.is_tcp());
    }

    #[cfg(unix)]
    #[test]
    fn test_parse_ipc() {
        let endpoint = Endpoint::parse("ipc:///tmp/test.sock").unwrap();
        assert!(endpoint.is_ipc());
        assert_eq!(endpoint.kind(), TransportKind::LocalDomain);
        assert_eq!(endpoint.to_string(), "ipc:///tmp/test.sock");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = Endpoint::parse("http://127.0.0.1:5555");
        assert!(matches!(result, Err(MessagingError::InvalidProtocol(_))));
    }

    #[test]
    fn test_invalid_tcp_address() {
        let result = Endpoint::parse("tcp://invalid:port");
        assert!(matches!(result, Err(MessagingError::InvalidProtocol(_))));
    }
}
