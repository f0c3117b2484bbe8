//! ZMTP socket types spoken by bus endpoints.

use std::fmt;

/// Socket types a ProcLink endpoint can meet on the wire.
///
/// Only the publish/subscribe family is recognised; any other type in a
/// peer's READY command fails the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketType {
    /// Publisher (what `Publisher` announces)
    Pub,
    /// Subscriber (what `Subscriber` announces)
    Sub,
    /// Extended publisher, e.g. a libzmq proxy frontend
    XPub,
    /// Extended subscriber, e.g. a libzmq proxy backend
    XSub,
}

impl SocketType {
    /// Name used in the READY `Socket-Type` property.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pub => "PUB",
            Self::Sub => "SUB",
            Self::XPub => "XPUB",
            Self::XSub => "XSUB",
        }
    }

    /// Parse a `Socket-Type` property value.
    pub fn from_wire(name: &[u8]) -> Option<Self> {
        match name {
            b"PUB" => Some(Self::Pub),
            b"SUB" => Some(Self::Sub),
            b"XPUB" => Some(Self::XPub),
            b"XSUB" => Some(Self::XSub),
            _ => None,
        }
    }

    /// Check if this socket type may talk to `peer`.
    pub fn is_compatible(&self, peer: SocketType) -> bool {
        matches!(
            (self, peer),
            (Self::Pub | Self::XPub, Self::Sub | Self::XSub)
                | (Self::Sub | Self::XSub, Self::Pub | Self::XPub)
        )
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_type_wire_names() {
        for t in [SocketType::Pub, SocketType::Sub, SocketType::XPub, SocketType::XSub] {
            assert_eq!(SocketType::from_wire(t.as_str().as_bytes()), Some(t));
        }
        assert_eq!(SocketType::from_wire(b"DEALER"), None);
    }

    #[test]
    fn test_socket_compatibility() {
        assert!(SocketType::Pub.is_compatible(SocketType::Sub));
        assert!(SocketType::Sub.is_compatible(SocketType::Pub));
        assert!(SocketType::Sub.is_compatible(SocketType::XPub));
        assert!(SocketType::XPub.is_compatible(SocketType::XSub));

        assert!(!SocketType::Pub.is_compatible(SocketType::Pub));
        assert!(!SocketType::Sub.is_compatible(SocketType::XSub));
    }
}
