//! Append-only, round-indexed record of what the local peer received and granted.
//!
//! The harness appends one entry per completed round. The decision engine only reads it.

use std::collections::HashMap;

use crate::{
    messages::{Download, Upload},
    peer_id::PeerId,
};

#[derive(Debug, Default, Clone)]
struct RoundRecord {
    downloads: Vec<Download>,
    uploads: Vec<Upload>,
}

#[derive(Debug, Default, Clone)]
pub struct History {
    rounds: Vec<RoundRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// The round being played now. Equals the number of completed rounds.
    pub fn current_round(&self) -> u32 {
        self.rounds.len() as u32
    }

    pub fn record_round(&mut self, downloads: Vec<Download>, uploads: Vec<Upload>) {
        self.rounds.push(RoundRecord { downloads, uploads });
    }

    /// Downloads received in a completed round. Empty for rounds not played yet.
    pub fn downloads(&self, round: u32) -> &[Download] {
        self.rounds
            .get(round as usize)
            .map(|r| r.downloads.as_slice())
            .unwrap_or_default()
    }

    /// Uploads granted in a completed round. Empty for rounds not played yet.
    pub fn uploads(&self, round: u32) -> &[Upload] {
        self.rounds
            .get(round as usize)
            .map(|r| r.uploads.as_slice())
            .unwrap_or_default()
    }

    /// Blocks received per sender, summed over `rounds` (clamped to played rounds).
    pub fn blocks_received(&self, rounds: std::ops::Range<u32>) -> HashMap<PeerId, u64> {
        let mut received = HashMap::new();
        for round in rounds.start..rounds.end.min(self.current_round()) {
            for dl in self.downloads(round) {
                *received.entry(dl.from_id.clone()).or_default() += dl.blocks as u64;
            }
        }
        received
    }

    /// Blocks received per sender in the round before the current one.
    pub fn blocks_received_last_round(&self) -> HashMap<PeerId, u64> {
        match self.current_round().checked_sub(1) {
            Some(prev) => self.blocks_received(prev..prev + 1),
            None => HashMap::new(),
        }
    }

    /// True if `peer` sent us at least one block in `round`.
    pub fn received_from(&self, round: u32, peer: &PeerId) -> bool {
        self.downloads(round)
            .iter()
            .any(|dl| &dl.from_id == peer && dl.blocks > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pieces::PieceIndex;

    fn dl(from: &str, blocks: u32) -> Download {
        Download {
            from_id: from.into(),
            to_id: "me".into(),
            piece: PieceIndex::new(0),
            blocks,
        }
    }

    #[test]
    fn test_empty_history() {
        let h = History::new();
        assert_eq!(h.current_round(), 0);
        assert!(h.downloads(0).is_empty());
        assert!(h.uploads(5).is_empty());
        assert!(h.blocks_received_last_round().is_empty());
    }

    #[test]
    fn test_blocks_received() {
        let mut h = History::new();
        h.record_round(vec![dl("a", 2), dl("b", 1)], vec![]);
        h.record_round(vec![dl("a", 3), dl("a", 1)], vec![]);
        assert_eq!(h.current_round(), 2);

        let last = h.blocks_received_last_round();
        assert_eq!(last.get("a"), Some(&4));
        assert_eq!(last.get("b"), None);

        let both = h.blocks_received(0..10);
        assert_eq!(both.get("a"), Some(&6));
        assert_eq!(both.get("b"), Some(&1));

        assert!(h.received_from(0, &"b".into()));
        assert!(!h.received_from(1, &"b".into()));
    }
}
