use crate::codec::ZmtpError;
use bytes::{BufMut, BytesMut};

/// ZMTP Greeting is always exactly 64 bytes
pub const GREETING_SIZE: usize = 64;

const SIGNATURE_HEAD: u8 = 0xFF;
const SIGNATURE_TAIL: u8 = 0x7F;

/// Security mechanism named in a greeting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mechanism {
    Null,
    Other(String),
}

/// Parsed greeting information
#[derive(Debug, Clone)]
pub struct ZmtpGreeting {
    pub major: u8,
    pub minor: u8,
    pub mechanism: Mechanism,
    pub as_server: bool,
}

impl ZmtpGreeting {
    /// Parse a 64-byte ZMTP greeting
    ///
    /// Layout (ZMTP 3.x):
    /// ```text
    /// [0]      0xFF
    /// [1..9]   Padding
    /// [9]      0x7F
    /// [10]     Major version
    /// [11]     Minor version
    /// [12..32] Mechanism (ASCII, null-padded)
    /// [32]     As-Server flag
    /// [33..64] Padding
    /// ```
    ///
    /// Any 3.x peer is accepted (libzmq 4.1+).
    pub fn parse(src: &[u8]) -> crate::codec::Result<Self> {
        if src.len() < GREETING_SIZE {
            return Err(ZmtpError::Protocol("short greeting"));
        }

        if src[0] != SIGNATURE_HEAD || src[9] != SIGNATURE_TAIL {
            return Err(ZmtpError::Protocol("bad greeting signature"));
        }

        let major = src[10];
        if major < 3 {
            return Err(ZmtpError::Protocol("peer speaks ZMTP older than 3.0"));
        }

        let mech_str = std::str::from_utf8(&src[12..32])
            .map_err(|_| ZmtpError::Protocol("mechanism is not ASCII"))?
            .trim_matches(char::from(0));

        let mechanism = match mech_str {
            "NULL" => Mechanism::Null,
            other => Mechanism::Other(other.to_string()),
        };

        Ok(Self {
            major,
            minor: src[11],
            mechanism,
            as_server: (src[32] & 0x01) != 0,
        })
    }
}

/// Build our ZMTP 3.0 greeting (NULL mechanism, client role).
pub fn build_greeting() -> [u8; GREETING_SIZE] {
    let mut b = BytesMut::with_capacity(GREETING_SIZE);

    b.put_u8(SIGNATURE_HEAD);
    b.put_bytes(0, 8);
    b.put_u8(SIGNATURE_TAIL);
    b.put_slice(&[0x03, 0x00]);
    b.put_slice(b"NULL");
    b.put_bytes(0, 16);
    // as-server = 0, then filler
    b.put_bytes(0, 32);

    let mut out = [0u8; GREETING_SIZE];
    out.copy_from_slice(&b);
    out
}
