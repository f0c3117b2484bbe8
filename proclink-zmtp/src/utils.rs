use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::ZmtpFrame;

/// ZMTP frame flags
pub const FLAG_MORE: u8 = 0x01;
pub const FLAG_LONG: u8 = 0x02;
pub const FLAG_COMMAND: u8 = 0x04;

/// Encode a single-part data message (header + body) ready for the socket.
///
/// compio writes take owned buffers, so the result is a `Vec<u8>`.
pub fn encode_message(body: &[u8]) -> Vec<u8> {
    let mut out = BytesMut::with_capacity(9 + body.len());
    ZmtpFrame::data(Bytes::copy_from_slice(body), false).encode_into(&mut out);
    out.to_vec()
}

/// Encode a command frame.
pub fn encode_command(body: Bytes) -> Vec<u8> {
    ZmtpFrame::command(body).encode().to_vec()
}

/// Build a READY command body (ZMTP/37).
///
/// Grammar:
/// - 1 byte: command name length
/// - "READY"
/// - Repeated properties:
///   - 1 byte: property name length
///   - property name
///   - 4 bytes: value length (BE)
///   - value
pub fn build_ready(socket_type: &str) -> Bytes {
    let mut body = BytesMut::new();

    body.put_u8(5);
    body.extend_from_slice(b"READY");
    put_property(&mut body, "Socket-Type", socket_type.as_bytes());

    body.freeze()
}

#[inline]
fn put_property(dst: &mut BytesMut, name: &str, value: &[u8]) {
    let name_bytes = name.as_bytes();

    dst.put_u8(name_bytes.len() as u8);
    dst.extend_from_slice(name_bytes);

    dst.put_u32(value.len() as u32);
    dst.extend_from_slice(value);
}
