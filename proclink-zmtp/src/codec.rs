use bytes::{Buf, BufMut, Bytes, BytesMut};
use proclink_core::error::MessagingError;
use thiserror::Error;

use crate::utils::{FLAG_COMMAND, FLAG_LONG, FLAG_MORE};

/// ZMTP protocol errors
#[derive(Debug, Error)]
pub enum ZmtpError {
    #[error("Protocol violation: reserved bits set")]
    ReservedBits,

    #[error("Protocol violation: frame of {size} bytes exceeds limit of {max}")]
    SizeTooLarge { size: u64, max: usize },

    #[error("Protocol violation: {0}")]
    Protocol(&'static str),
}

/// Result type alias for ZMTP operations
pub type Result<T> = std::result::Result<T, ZmtpError>;

impl From<ZmtpError> for MessagingError {
    fn from(e: ZmtpError) -> Self {
        MessagingError::invalid_frame(e.to_string())
    }
}

/// A decoded ZMTP frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZmtpFrame {
    pub flags: u8,
    pub payload: Bytes,
}

impl ZmtpFrame {
    /// Create a data frame
    pub const fn data(payload: Bytes, more: bool) -> Self {
        let flags = if more { FLAG_MORE } else { 0 };
        Self { flags, payload }
    }

    /// Create a command frame
    pub const fn command(payload: Bytes) -> Self {
        Self {
            flags: FLAG_COMMAND,
            payload,
        }
    }

    #[inline]
    pub const fn more(&self) -> bool {
        (self.flags & FLAG_MORE) != 0
    }

    #[inline]
    pub const fn is_command(&self) -> bool {
        (self.flags & FLAG_COMMAND) != 0
    }

    /// Encode header and body into `dst`. The LONG flag is derived from the
    /// body length.
    pub fn encode_into(&self, dst: &mut BytesMut) {
        let len = self.payload.len();
        let flags = self.flags & !FLAG_LONG;
        if len <= 255 {
            dst.reserve(2 + len);
            dst.put_u8(flags);
            dst.put_u8(len as u8);
        } else {
            dst.reserve(9 + len);
            dst.put_u8(flags | FLAG_LONG);
            dst.put_u64(len as u64);
        }
        dst.extend_from_slice(&self.payload);
    }

    /// Encode this frame to bytes
    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::new();
        self.encode_into(&mut out);
        out.freeze()
    }
}

/// Incremental ZMTP frame decoder.
///
/// Bytes read from the socket are appended to a `BytesMut` owned by the
/// caller; `decode` splits complete frames off its front and leaves partial
/// ones in place until more data arrives.
#[derive(Debug)]
pub struct ZmtpDecoder {
    max_frame_size: usize,
}

impl Default for ZmtpDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ZmtpDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_frame_size: usize::MAX,
        }
    }

    /// Reject frames with a body larger than `max` bytes.
    #[must_use]
    pub fn with_max_frame_size(max: Option<usize>) -> Self {
        Self {
            max_frame_size: max.unwrap_or(usize::MAX),
        }
    }

    /// Decode a single frame from `src`
    ///
    /// Returns:
    /// - Ok(Some(frame)) → frame decoded
    /// - Ok(None) → need more data
    /// - Err → protocol violation
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ZmtpFrame>> {
        if src.len() < 2 {
            return Ok(None);
        }

        let flags = src[0];

        // Reserved bits must be zero (bits 3–7)
        if (flags & 0xF8) != 0 {
            return Err(ZmtpError::ReservedBits);
        }

        let is_long = (flags & FLAG_LONG) != 0;
        let header_len = if is_long { 9 } else { 2 };

        if src.len() < header_len {
            return Ok(None);
        }

        let body_len = if is_long {
            let mut len_bytes = &src[1..9];
            len_bytes.get_u64()
        } else {
            u64::from(src[1])
        };

        if body_len > self.max_frame_size as u64 {
            return Err(ZmtpError::SizeTooLarge {
                size: body_len,
                max: self.max_frame_size,
            });
        }
        let body_len = usize::try_from(body_len).map_err(|_| ZmtpError::SizeTooLarge {
            size: body_len,
            max: self.max_frame_size,
        })?;
        let frame_len = header_len
            .checked_add(body_len)
            .ok_or(ZmtpError::Protocol("frame length overflows"))?;

        // The announced length is peer-controlled: wait for the bytes to
        // arrive instead of allocating for them up front.
        if src.len() < frame_len {
            return Ok(None);
        }

        src.advance(header_len);
        let payload = src.split_to(body_len).freeze();
        Ok(Some(ZmtpFrame {
            flags: flags & !FLAG_LONG,
            payload,
        }))
    }
}
