//! Per-peer estimates of how much a peer gives us and how much we must give to keep it.

use tatpeer_core::{
    PeerId,
    config::{EstimatorKind, RateAuctionConfig},
    history::History,
};

mod adaptive;
mod snapshot;

pub use adaptive::{AdaptiveEstimator, AdaptiveParams, RateEstimates};
pub use snapshot::SnapshotEstimator;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateEstimate {
    /// Blocks per round we expect to receive from the peer.
    pub download: f64,
    /// Bandwidth we expect to need to spend to be reciprocated.
    pub upload: f64,
}

pub trait RateEstimator: Send {
    /// Fold the last completed round of `history` into the estimates. Called once per round.
    fn update(&mut self, me: &PeerId, history: &History);

    fn estimate(&self, peer: &PeerId) -> RateEstimate;
}

pub fn estimator_from_config(config: &RateAuctionConfig) -> Box<dyn RateEstimator> {
    let defaults = RateEstimate {
        download: config.initial_download_rate,
        upload: config.initial_upload_rate,
    };
    match config.estimator {
        EstimatorKind::Snapshot => Box::new(SnapshotEstimator::new(defaults)),
        EstimatorKind::Adaptive => Box::new(AdaptiveEstimator::new(
            AdaptiveParams {
                alpha: config.alpha,
                gamma: config.gamma,
                reciprocation_rounds: config.reciprocation_rounds,
            },
            defaults,
        )),
    }
}
