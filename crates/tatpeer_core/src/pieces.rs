use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PieceIndex(u32);

impl PieceIndex {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for PieceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for PieceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMarkingResult {
    PreviouslyCompleted,
    NotCompleted,
    Completed,
}

/// Local completion state: how many blocks of each piece we already hold.
///
/// Blocks inside a piece always arrive in order, so a single counter per piece
/// is enough. Counters only grow and never exceed `blocks_per_piece`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceCompletion {
    blocks_per_piece: u32,
    held: Vec<u32>,
}

impl PieceCompletion {
    /// Nothing downloaded yet.
    pub fn empty(total_pieces: u32, blocks_per_piece: u32) -> Self {
        Self {
            blocks_per_piece,
            held: vec![0; total_pieces as usize],
        }
    }

    /// Every piece fully held.
    pub fn seed(total_pieces: u32, blocks_per_piece: u32) -> Self {
        Self {
            blocks_per_piece,
            held: vec![blocks_per_piece; total_pieces as usize],
        }
    }

    /// Build from explicit per-piece block counts. Counts above `blocks_per_piece`
    /// are clamped.
    pub fn from_counts(blocks_per_piece: u32, counts: impl IntoIterator<Item = u32>) -> Self {
        Self {
            blocks_per_piece,
            held: counts
                .into_iter()
                .map(|c| c.min(blocks_per_piece))
                .collect(),
        }
    }

    pub fn blocks_per_piece(&self) -> u32 {
        self.blocks_per_piece
    }

    pub fn total_pieces(&self) -> u32 {
        self.held.len() as u32
    }

    pub fn held_blocks(&self, index: PieceIndex) -> Option<u32> {
        self.held.get(index.0 as usize).copied()
    }

    pub fn is_complete(&self, index: PieceIndex) -> bool {
        self.held_blocks(index)
            .map(|h| h >= self.blocks_per_piece)
            .unwrap_or(false)
    }

    pub fn is_seed(&self) -> bool {
        self.held.iter().all(|h| *h >= self.blocks_per_piece)
    }

    pub fn completed_pieces(&self) -> impl Iterator<Item = PieceIndex> + '_ {
        self.iter_with_counts()
            .filter(|(_, h)| *h >= self.blocks_per_piece)
            .map(|(idx, _)| idx)
    }

    /// Pieces we still need, in ascending index order.
    pub fn needed_pieces(&self) -> impl Iterator<Item = PieceIndex> + '_ {
        self.iter_with_counts()
            .filter(|(_, h)| *h < self.blocks_per_piece)
            .map(|(idx, _)| idx)
    }

    pub fn held_blocks_total(&self) -> u64 {
        self.held.iter().map(|h| *h as u64).sum()
    }

    fn iter_with_counts(&self) -> impl Iterator<Item = (PieceIndex, u32)> + '_ {
        self.held
            .iter()
            .enumerate()
            .map(|(idx, h)| (PieceIndex(idx as u32), *h))
    }

    /// Apply `blocks` newly received blocks of a piece.
    pub fn record_blocks(&mut self, index: PieceIndex, blocks: u32) -> Result<BlockMarkingResult> {
        let blocks_per_piece = self.blocks_per_piece;
        let held = self
            .held
            .get_mut(index.0 as usize)
            .ok_or(Error::InvalidPieceIndex(index))?;
        if *held >= blocks_per_piece {
            return Ok(BlockMarkingResult::PreviouslyCompleted);
        }
        *held = held.saturating_add(blocks).min(blocks_per_piece);
        trace!(piece = %index, held = *held, "recorded blocks");
        if *held >= blocks_per_piece {
            return Ok(BlockMarkingResult::Completed);
        }
        Ok(BlockMarkingResult::NotCompleted)
    }
}
