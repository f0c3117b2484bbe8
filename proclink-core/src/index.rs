//! Publisher-side subscription index.
//!
//! Prefixes are kept in a Vec sorted lexicographically so `match_topic` can
//! stop scanning as soon as a prefix sorts after the topic. Each prefix holds
//! the peers subscribed to it together with a per-peer count: a subscriber
//! that sends the same prefix twice needs two cancels before it stops
//! receiving.

use bytes::Bytes;
use smallvec::SmallVec;

/// Compact integer ID for a connected subscriber.
pub type PeerKey = u64;

#[derive(Debug, Clone)]
struct Entry {
    prefix: Bytes,
    /// (peer, refcount). Inline up to 4 peers, the usual fan-out.
    peers: SmallVec<[(PeerKey, u32); 4]>,
}

#[derive(Debug, Default)]
pub struct SubscriptionIndex {
    entries: Vec<Entry>,
}

impl SubscriptionIndex {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct prefixes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Adds one reference from `peer` to `prefix`.
    pub fn subscribe(&mut self, peer: PeerKey, prefix: Bytes) {
        match self.entries.binary_search_by(|e| e.prefix.cmp(&prefix)) {
            Ok(idx) => {
                let peers = &mut self.entries[idx].peers;
                match peers.iter_mut().find(|(p, _)| *p == peer) {
                    Some((_, count)) => *count += 1,
                    None => peers.push((peer, 1)),
                }
            }
            Err(idx) => {
                let mut peers = SmallVec::new();
                peers.push((peer, 1));
                self.entries.insert(idx, Entry { prefix, peers });
            }
        }
    }

    /// Drops one reference from `peer` to `prefix`.
    pub fn unsubscribe(&mut self, peer: PeerKey, prefix: &[u8]) {
        let Ok(idx) = self.entries.binary_search_by(|e| e.prefix.as_ref().cmp(prefix)) else {
            return;
        };
        let peers = &mut self.entries[idx].peers;
        if let Some(pos) = peers.iter().position(|(p, _)| *p == peer) {
            peers[pos].1 -= 1;
            if peers[pos].1 == 0 {
                peers.swap_remove(pos);
            }
        }
        if peers.is_empty() {
            self.entries.remove(idx);
        }
    }

    /// Remove `peer` from every prefix (used on disconnect).
    pub fn remove_peer(&mut self, peer: PeerKey) {
        self.entries.retain_mut(|e| {
            e.peers.retain(|(p, _)| *p != peer);
            !e.peers.is_empty()
        });
    }

    /// Peers with at least one prefix of `topic`, deduplicated and sorted.
    #[must_use]
    pub fn match_topic(&self, topic: &[u8]) -> SmallVec<[PeerKey; 16]> {
        let mut out: SmallVec<[PeerKey; 16]> = SmallVec::new();

        for entry in &self.entries {
            let p = entry.prefix.as_ref();
            // prefix="apply" > topic="apple": nothing further can match.
            if p > topic {
                break;
            }
            if topic.starts_with(p) {
                out.extend(entry.peers.iter().map(|(peer, _)| *peer));
            }
        }

        if out.len() > 1 {
            out.sort_unstable();
            out.dedup();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_and_match() {
        let mut idx = SubscriptionIndex::new();

        idx.subscribe(1, Bytes::from_static(b"A"));
        idx.subscribe(2, Bytes::from_static(b"AB"));
        idx.subscribe(3, Bytes::from_static(b"B"));

        assert_eq!(idx.match_topic(b"ABC").as_slice(), &[1, 2]);
        assert_eq!(idx.match_topic(b"BANANA").as_slice(), &[3]);
        assert!(idx.match_topic(b"C").is_empty());
    }

    #[test]
    fn empty_prefix_matches_everything() {
        let mut idx = SubscriptionIndex::new();
        idx.subscribe(9, Bytes::new());

        assert_eq!(idx.match_topic(b"drone_status 1").as_slice(), &[9]);
        assert_eq!(idx.match_topic(b"").as_slice(), &[9]);
    }

    #[test]
    fn dedup_nested_prefixes() {
        let mut idx = SubscriptionIndex::new();

        idx.subscribe(7, Bytes::from_static(b"A"));
        idx.subscribe(7, Bytes::from_static(b"AB"));

        assert_eq!(idx.match_topic(b"ABCD").as_slice(), &[7]);
    }

    #[test]
    fn unsubscribe_is_refcounted() {
        let mut idx = SubscriptionIndex::new();

        idx.subscribe(1, Bytes::from_static(b"t"));
        idx.subscribe(1, Bytes::from_static(b"t"));
        idx.unsubscribe(1, b"t");
        assert_eq!(idx.match_topic(b"t").as_slice(), &[1]);

        idx.unsubscribe(1, b"t");
        assert!(idx.match_topic(b"t").is_empty());
        assert!(idx.is_empty());
    }

    #[test]
    fn remove_peer_cleans_empty_entries() {
        let mut idx = SubscriptionIndex::new();

        idx.subscribe(1, Bytes::from_static(b"A"));
        idx.subscribe(2, Bytes::from_static(b"A"));
        idx.subscribe(1, Bytes::from_static(b"AB"));

        idx.remove_peer(1);

        assert_eq!(idx.match_topic(b"ABCD").as_slice(), &[2]);
        assert_eq!(idx.len(), 1);
    }
}
