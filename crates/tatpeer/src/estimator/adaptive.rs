use std::collections::{BTreeSet, HashMap};

use tatpeer_core::{PeerId, history::History};
use tracing::trace;

use super::{RateEstimate, RateEstimator};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveParams {
    pub alpha: f64,
    pub gamma: f64,
    pub reciprocation_rounds: u32,
}

/// Persistent per-peer estimates. Peers missing from a map use the default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateEstimates {
    pub download: HashMap<PeerId, f64>,
    pub upload: HashMap<PeerId, f64>,
}

/// Estimator used by the rate auction.
///
/// The download estimate of a peer is the number of blocks (not download records) it sent
/// us the last time it sent anything. The upload estimate probes for the cheapest bid that
/// keeps the peer reciprocating: it grows by `alpha` every round the peer ignored our
/// upload, and shrinks by `gamma` once the peer has reciprocated for
/// `reciprocation_rounds` rounds in a row.
pub struct AdaptiveEstimator {
    params: AdaptiveParams,
    defaults: RateEstimate,
    estimates: RateEstimates,
}

impl AdaptiveEstimator {
    pub fn new(params: AdaptiveParams, defaults: RateEstimate) -> Self {
        Self::with_estimates(params, defaults, Default::default())
    }

    pub fn with_estimates(
        params: AdaptiveParams,
        defaults: RateEstimate,
        estimates: RateEstimates,
    ) -> Self {
        Self {
            params,
            defaults,
            estimates,
        }
    }

    pub fn estimates(&self) -> &RateEstimates {
        &self.estimates
    }

    fn reciprocated_every_round(&self, history: &History, peer: &PeerId) -> bool {
        let round = history.current_round();
        let r = self.params.reciprocation_rounds;
        round >= r && (round - r..round).all(|rd| history.received_from(rd, peer))
    }
}

impl RateEstimator for AdaptiveEstimator {
    fn update(&mut self, me: &PeerId, history: &History) {
        let Some(prev) = history.current_round().checked_sub(1) else {
            return;
        };

        let received = history.blocks_received(prev..prev + 1);
        for (peer, blocks) in received.iter() {
            if *blocks > 0 {
                self.estimates.download.insert(peer.clone(), *blocks as f64);
            }
        }

        let unchoked: BTreeSet<&PeerId> = history
            .uploads(prev)
            .iter()
            .filter(|ul| &ul.from_id == me)
            .map(|ul| &ul.to_id)
            .collect();

        for peer in unchoked {
            let reciprocated = received.get(peer).is_some_and(|b| *b > 0);
            let factor = if !reciprocated {
                1. + self.params.alpha
            } else if self.reciprocated_every_round(history, peer) {
                1. - self.params.gamma
            } else {
                continue;
            };
            let upload = self
                .estimates
                .upload
                .entry(peer.clone())
                .or_insert(self.defaults.upload);
            *upload = (*upload * factor).max(0.);
            trace!(%peer, upload = *upload, reciprocated, "updated upload estimate");
        }
    }

    fn estimate(&self, peer: &PeerId) -> RateEstimate {
        RateEstimate {
            download: self
                .estimates
                .download
                .get(peer)
                .copied()
                .unwrap_or(self.defaults.download),
            upload: self
                .estimates
                .upload
                .get(peer)
                .copied()
                .unwrap_or(self.defaults.upload),
        }
    }
}
