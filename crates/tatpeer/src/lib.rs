//!
//! Decision core of a simulated peer in a BitTorrent-like swarm.
//!
//! Every round the swarm harness asks each peer two questions through the [`Agent`] trait:
//! which blocks to request from whom, and whom to upload to with how much bandwidth.
//!
//! # Quick usage example
//!
//! ```
//! use tatpeer::*;
//!
//! let config = PeerConfig::default();
//! let pieces = PieceCompletion::empty(8, config.blocks_per_piece);
//! let mut peer = RoundController::from_seed("peer1", config, pieces, 42).unwrap();
//!
//! let history = History::new();
//! let peers = vec![PeerView::new("Seed0", 0..8)];
//! let requests = peer.requests(&peers, &history).unwrap();
//! assert_eq!(requests.len(), 4);
//!
//! // Nobody asked us for anything.
//! let uploads = peer.uploads(&[], &peers, &history).unwrap();
//! assert!(uploads.is_empty());
//! ```
//!
//! # Overview
//! [`RoundController`] wires together the rarest-first [`PieceSelector`], a
//! [`RateEstimator`] and one of the upload policies in [`allocator`]:
//! [`Reciprocal`] (tit-for-tat with optimistic unchoke), [`PropShare`] or
//! [`RateAuction`]. The policy is picked by [`PolicyConfig`].

pub mod allocator;
pub mod estimator;
pub mod piece_selector;
pub mod rarity;
mod round;
#[cfg(feature = "tracing-subscriber-utils")]
pub mod tracing_subscriber_config_utils;

pub use allocator::{
    AllocationContext, OptimisticUnchokeState, PropShare, RateAuction, Reciprocal, UploadPolicy,
    even_split,
};
pub use estimator::{
    AdaptiveEstimator, RateEstimate, RateEstimates, RateEstimator, SnapshotEstimator,
};
pub use piece_selector::PieceSelector;
pub use rarity::RarityIndex;
pub use round::{Agent, RoundController, RoundPhase};

pub use tatpeer_core::config::*;
pub use tatpeer_core::history::History;
pub use tatpeer_core::messages::*;
pub use tatpeer_core::pieces::*;
pub use tatpeer_core::{Error, PeerId, Result};


/// The cargo version of tatpeer.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
