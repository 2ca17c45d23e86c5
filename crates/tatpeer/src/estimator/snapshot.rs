use std::collections::{HashMap, HashSet};

use tatpeer_core::{PeerId, history::History};

use super::{RateEstimate, RateEstimator};

/// Download estimate = blocks received from the peer in the previous round.
///
/// Peers never heard from get the default estimate; peers that sent something once but
/// were silent last round estimate 0. Upload estimates stay at the default.
pub struct SnapshotEstimator {
    defaults: RateEstimate,
    last_round: HashMap<PeerId, u64>,
    observed: HashSet<PeerId>,
}

impl SnapshotEstimator {
    pub fn new(defaults: RateEstimate) -> Self {
        Self {
            defaults,
            last_round: Default::default(),
            observed: Default::default(),
        }
    }
}

impl RateEstimator for SnapshotEstimator {
    fn update(&mut self, _me: &PeerId, history: &History) {
        self.last_round = history.blocks_received_last_round();
        self.observed.extend(self.last_round.keys().cloned());
    }

    fn estimate(&self, peer: &PeerId) -> RateEstimate {
        let download = match self.last_round.get(peer) {
            Some(blocks) => *blocks as f64,
            None if self.observed.contains(peer) => 0.,
            None => self.defaults.download,
        };
        RateEstimate {
            download,
            upload: self.defaults.upload,
        }
    }
}
