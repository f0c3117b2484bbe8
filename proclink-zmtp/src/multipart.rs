use crate::codec::ZmtpFrame;
use crate::envelope::SEPARATOR;
use bytes::{Bytes, BytesMut};

/// Errors produced by MultipartBuffer
#[derive(Debug, PartialEq, Eq)]
pub enum MultipartError {
    /// Message exceeded configured frame count
    TooManyFrames,
    /// Message exceeded configured byte size
    TooLarge,
}

/// Collects data frames until a message is complete and flattens it into a
/// single body.
///
/// ProcLink publishers send one frame per message. Peers that send the topic
/// and payload as separate frames (`send_multipart([topic, payload])`) are
/// accepted by joining the frames with the envelope separator.
///
/// Limits are enforced eagerly; a violating message is discarded as a whole.
pub struct MultipartBuffer {
    frames: Vec<Bytes>,
    byte_count: usize,
    max_frames: usize,
    max_bytes: usize,
    /// Dropping the rest of a message that broke a limit
    discarding: bool,
}

impl MultipartBuffer {
    pub fn new(max_frames: usize, max_bytes: usize) -> Self {
        Self {
            frames: Vec::new(),
            byte_count: 0,
            max_frames,
            max_bytes,
            discarding: false,
        }
    }

    /// Push a data frame.
    ///
    /// Returns:
    /// - `Ok(None)` if the message is not complete
    /// - `Ok(Some(body))` once the last frame arrived
    /// - `Err(MultipartError)` on a limit violation; the remaining frames of
    ///   that message are swallowed
    pub fn push_frame(&mut self, frame: ZmtpFrame) -> Result<Option<Bytes>, MultipartError> {
        let more = frame.more();
        if self.discarding {
            self.discarding = more;
            return Ok(None);
        }

        if self.frames.len() + 1 > self.max_frames {
            self.abandon(more);
            return Err(MultipartError::TooManyFrames);
        }

        self.byte_count = self.byte_count.saturating_add(frame.payload.len());
        if self.byte_count > self.max_bytes {
            self.abandon(more);
            return Err(MultipartError::TooLarge);
        }

        self.frames.push(frame.payload);
        if more {
            return Ok(None);
        }

        let body = if self.frames.len() == 1 {
            self.frames.pop().unwrap_or_default()
        } else {
            let mut joined = BytesMut::with_capacity(self.byte_count + self.frames.len());
            for (i, part) in self.frames.iter().enumerate() {
                if i > 0 {
                    joined.extend_from_slice(&[SEPARATOR]);
                }
                joined.extend_from_slice(part);
            }
            joined.freeze()
        };
        self.reset();
        Ok(Some(body))
    }

    /// Whether a message is partially collected or being discarded.
    pub fn in_progress(&self) -> bool {
        self.discarding || !self.frames.is_empty()
    }

    fn abandon(&mut self, more: bool) {
        self.reset();
        self.discarding = more;
    }

    #[inline]
    fn reset(&mut self) {
        self.frames.clear();
        self.byte_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame_passthrough() {
        let mut buf = MultipartBuffer::new(8, 1024);
        let body = buf
            .push_frame(ZmtpFrame::data(Bytes::from_static(b"t hello"), false))
            .unwrap();
        assert_eq!(body, Some(Bytes::from_static(b"t hello")));
        assert!(!buf.in_progress());
    }

    #[test]
    fn test_frames_joined_with_separator() {
        let mut buf = MultipartBuffer::new(8, 1024);
        assert_eq!(
            buf.push_frame(ZmtpFrame::data(Bytes::from_static(b"drone_status"), true)),
            Ok(None)
        );
        assert!(buf.in_progress());
        let body = buf
            .push_frame(ZmtpFrame::data(Bytes::from_static(b"up"), false))
            .unwrap();
        assert_eq!(body, Some(Bytes::from_static(b"drone_status up")));
    }

    #[test]
    fn test_limits() {
        let mut buf = MultipartBuffer::new(1, 1024);
        buf.push_frame(ZmtpFrame::data(Bytes::from_static(b"a"), true)).unwrap();
        assert_eq!(
            buf.push_frame(ZmtpFrame::data(Bytes::from_static(b"b"), false)),
            Err(MultipartError::TooManyFrames)
        );

        let mut buf = MultipartBuffer::new(8, 3);
        assert_eq!(
            buf.push_frame(ZmtpFrame::data(Bytes::from_static(b"abcd"), false)),
            Err(MultipartError::TooLarge)
        );
        assert!(!buf.in_progress());
    }

    #[test]
    fn test_tail_of_rejected_message_is_dropped() {
        let mut buf = MultipartBuffer::new(2, 1024);
        let frame = |body: &'static [u8], more| ZmtpFrame::data(Bytes::from_static(body), more);

        assert_eq!(buf.push_frame(frame(b"secret", true)), Ok(None));
        assert_eq!(buf.push_frame(frame(b"x", true)), Ok(None));
        assert_eq!(
            buf.push_frame(frame(b"y", true)),
            Err(MultipartError::TooManyFrames)
        );
        assert!(buf.in_progress());

        // Last frame of the rejected message.
        assert_eq!(buf.push_frame(frame(b"drone_status forged", false)), Ok(None));
        assert!(!buf.in_progress());

        // The next message goes through untouched.
        assert_eq!(
            buf.push_frame(frame(b"drone_status up", false)),
            Ok(Some(Bytes::from_static(b"drone_status up")))
        );
    }

    #[test]
    fn test_oversized_last_frame_needs_no_discard() {
        let mut buf = MultipartBuffer::new(8, 3);
        assert_eq!(
            buf.push_frame(ZmtpFrame::data(Bytes::from_static(b"abcd"), false)),
            Err(MultipartError::TooLarge)
        );
        assert_eq!(
            buf.push_frame(ZmtpFrame::data(Bytes::from_static(b"ok"), false)),
            Ok(Some(Bytes::from_static(b"ok")))
        );
    }
}
