use std::collections::{HashMap, HashSet};

use tatpeer_core::{PieceIndex, messages::PeerView};

/// How many peers offer each piece this round. Recomputed from scratch every round.
#[derive(Debug, Default, Clone)]
pub struct RarityIndex {
    counts: HashMap<PieceIndex, usize>,
}

impl RarityIndex {
    pub fn from_peers(peers: &[PeerView]) -> Self {
        let mut counts: HashMap<PieceIndex, usize> = HashMap::new();
        let mut seen = HashSet::new();
        for peer in peers {
            seen.clear();
            for piece in peer.available_pieces.iter().copied() {
                // A peer advertising the same piece twice still counts once.
                if seen.insert(piece) {
                    *counts.entry(piece).or_default() += 1;
                }
            }
        }
        Self { counts }
    }

    /// Number of peers offering `piece`. 0 if nobody does.
    pub fn get(&self, piece: PieceIndex) -> usize {
        self.counts.get(&piece).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
