//! Subscriber-side topic filter and the ZMTP subscription message format.
//!
//! A [`SubscriptionFilter`] is a set of topic prefixes. An empty set means
//! "receive everything" and is announced to publishers as the single empty
//! prefix.

use bytes::Bytes;

/// Subscribe marker byte of a subscription message.
pub const SUBSCRIBE_BYTE: u8 = 0x01;
/// Cancel marker byte of a subscription message.
pub const CANCEL_BYTE: u8 = 0x00;

/// Set of topic prefixes owned by one subscriber.
///
/// Duplicates collapse and insertion order is irrelevant; prefixes are kept
/// sorted so two filters built from the same topics compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    prefixes: Vec<Bytes>,
}

impl SubscriptionFilter {
    /// Create a filter that accepts every topic
    #[must_use]
    pub const fn all() -> Self {
        Self {
            prefixes: Vec::new(),
        }
    }

    /// Build a filter from topic prefixes.
    pub fn new<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::all();
        for topic in topics {
            filter.subscribe(topic.as_ref());
        }
        filter
    }

    /// Add a prefix. Returns false if it was already present.
    pub fn subscribe(&mut self, prefix: &str) -> bool {
        let prefix = Bytes::copy_from_slice(prefix.as_bytes());
        match self.prefixes.binary_search(&prefix) {
            Ok(_) => false,
            Err(idx) => {
                self.prefixes.insert(idx, prefix);
                true
            }
        }
    }

    /// Remove a prefix. Returns false if it was not present.
    pub fn unsubscribe(&mut self, prefix: &str) -> bool {
        match self.prefixes.binary_search_by(|p| p.as_ref().cmp(prefix.as_bytes())) {
            Ok(idx) => {
                self.prefixes.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    /// Check a topic against the filter.
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        self.matches_bytes(topic.as_bytes())
    }

    /// Check raw bytes (a topic or a whole message body) against the filter.
    #[must_use]
    pub fn matches_bytes(&self, data: &[u8]) -> bool {
        self.prefixes.is_empty() || self.prefixes.iter().any(|p| data.starts_with(p))
    }

    /// Prefixes to announce to a publisher.
    #[must_use]
    pub fn wire_prefixes(&self) -> Vec<Bytes> {
        if self.prefixes.is_empty() {
            vec![Bytes::new()]
        } else {
            self.prefixes.clone()
        }
    }

    /// Subscription messages to send right after the handshake
    #[must_use]
    pub fn subscribe_messages(&self) -> Vec<Bytes> {
        self.wire_prefixes()
            .into_iter()
            .map(|p| SubscriptionEvent::Subscribe(p).to_message())
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &[u8]> {
        self.prefixes.iter().map(Bytes::as_ref)
    }
}

impl<S: AsRef<str>> FromIterator<S> for SubscriptionFilter {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Subscription change sent by a subscriber to a publisher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    /// A peer subscribed to a topic
    Subscribe(Bytes),
    /// A peer unsubscribed from a topic
    Unsubscribe(Bytes),
}

impl SubscriptionEvent {
    /// Create a subscription event from a ZMTP subscription message
    ///
    /// Format: [0x01|0x00] [topic prefix...]
    #[must_use]
    pub fn from_message(msg: &[u8]) -> Option<Self> {
        let (&cmd, rest) = msg.split_first()?;
        let prefix = Bytes::copy_from_slice(rest);
        match cmd {
            SUBSCRIBE_BYTE => Some(Self::Subscribe(prefix)),
            CANCEL_BYTE => Some(Self::Unsubscribe(prefix)),
            _ => None,
        }
    }

    /// Encode this event as a ZMTP subscription message
    #[must_use]
    pub fn to_message(&self) -> Bytes {
        let (cmd, prefix) = match self {
            Self::Subscribe(p) => (SUBSCRIBE_BYTE, p),
            Self::Unsubscribe(p) => (CANCEL_BYTE, p),
        };

        let mut msg = Vec::with_capacity(1 + prefix.len());
        msg.push(cmd);
        msg.extend_from_slice(prefix);
        Bytes::from(msg)
    }

    /// Get the topic prefix
    #[must_use]
    pub const fn prefix(&self) -> &Bytes {
        match self {
            Self::Subscribe(p) | Self::Unsubscribe(p) => p,
        }
    }

    #[must_use]
    pub const fn is_subscribe(&self) -> bool {
        matches!(self, Self::Subscribe(_))
    }
}
