//! Topic envelope: the `"<topic> <payload>"` message body.
//!
//! A message travels as one single-part ZMTP message whose body is the topic,
//! one space, then the payload. Receivers split on the first space, so the
//! payload may itself contain spaces while the topic may not.

use bytes::Bytes;
use proclink_core::error::{MessagingError, Result};

/// Separator between topic and payload.
pub const SEPARATOR: u8 = b' ';

/// A `(topic, payload)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub topic: String,
    pub payload: String,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Encode to a message body.
    pub fn encode(&self) -> Result<Bytes> {
        encode(&self.topic, &self.payload)
    }

    /// Decode a message body.
    ///
    /// A body without a separator is all topic with an empty payload.
    pub fn decode(body: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(body)
            .map_err(|e| MessagingError::invalid_frame(format!("body is not UTF-8: {e}")))?;
        let (topic, payload) = text.split_once(char::from(SEPARATOR)).unwrap_or((text, ""));
        Ok(Self::new(topic, payload))
    }
}

/// Encode `topic` and `payload` into a message body.
///
/// Fails with [`MessagingError::InvalidTopic`] if the topic contains the
/// separator, since receivers could not split it back.
pub fn encode(topic: &str, payload: &str) -> Result<Bytes> {
    if topic.as_bytes().contains(&SEPARATOR) {
        return Err(MessagingError::InvalidTopic(topic.to_string()));
    }
    let mut body = Vec::with_capacity(topic.len() + 1 + payload.len());
    body.extend_from_slice(topic.as_bytes());
    body.push(SEPARATOR);
    body.extend_from_slice(payload.as_bytes());
    Ok(Bytes::from(body))
}

/// Topic part of a body, without decoding the payload.
pub fn topic_of(body: &[u8]) -> &[u8] {
    match body.iter().position(|b| *b == SEPARATOR) {
        Some(idx) => &body[..idx],
        None => body,
    }
}
