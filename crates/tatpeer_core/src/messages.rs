use serde::{Deserialize, Serialize};

use crate::{peer_id::PeerId, pieces::PieceIndex};

/// Bandwidth units granted to a peer for one round.
pub type Bandwidth = u64;

/// What a remote peer offers this round. Only valid for the round it was handed out in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerView {
    pub id: PeerId,
    pub available_pieces: Vec<PieceIndex>,
}

impl PeerView {
    pub fn new(id: impl Into<PeerId>, available_pieces: impl IntoIterator<Item = u32>) -> Self {
        Self {
            id: id.into(),
            available_pieces: available_pieces.into_iter().map(PieceIndex::new).collect(),
        }
    }

    /// True if the peer offers every one of `total_pieces` pieces.
    pub fn is_seed(&self, total_pieces: u32) -> bool {
        let mut offered: Vec<u32> = self
            .available_pieces
            .iter()
            .map(|p| p.get())
            .filter(|p| *p < total_pieces)
            .collect();
        offered.sort_unstable();
        offered.dedup();
        offered.len() as u32 == total_pieces
    }
}

/// "Send me the next blocks of `piece`, starting at `start_block`."
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Request {
    pub requester_id: PeerId,
    pub peer_id: PeerId,
    pub piece: PieceIndex,
    pub start_block: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub from_id: PeerId,
    pub to_id: PeerId,
    pub bandwidth: Bandwidth,
}

/// Blocks received by `to_id` from `from_id` in a completed round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Download {
    pub from_id: PeerId,
    pub to_id: PeerId,
    pub piece: PieceIndex,
    pub blocks: u32,
}
