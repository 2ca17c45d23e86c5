//! Upload bandwidth allocation.
//!
//! Every policy gets the same [`AllocationContext`] and returns at most one [`Upload`] per
//! peer, each with nonzero bandwidth, summing to no more than the budget.

use rand::RngCore;
use tatpeer_core::{
    PeerId,
    config::PolicyConfig,
    history::History,
    messages::{Bandwidth, PeerView, Request, Upload},
};

use crate::estimator::RateEstimator;

mod prop_share;
mod rate_auction;
mod reciprocal;

pub use prop_share::PropShare;
pub use rate_auction::RateAuction;
pub use reciprocal::{OptimisticUnchokeState, Reciprocal};

pub struct AllocationContext<'a> {
    pub me: &'a PeerId,
    pub round: u32,
    /// Requests other peers sent us this round.
    pub requests: &'a [Request],
    pub peers: &'a [PeerView],
    pub history: &'a History,
    pub budget: Bandwidth,
    pub total_pieces: u32,
    pub estimator: &'a dyn RateEstimator,
}

impl AllocationContext<'_> {
    /// Distinct requesters, in the order of their first request.
    pub fn requesters(&self) -> Vec<PeerId> {
        let mut seen = std::collections::HashSet::new();
        self.requests
            .iter()
            .map(|r| &r.requester_id)
            .filter(|id| *id != self.me && seen.insert(*id))
            .cloned()
            .collect()
    }

    fn upload(&self, to: PeerId, bandwidth: Bandwidth) -> Upload {
        Upload {
            from_id: self.me.clone(),
            to_id: to,
            bandwidth,
        }
    }

    /// Grants that round down to zero bandwidth are dropped.
    fn uploads(&self, grants: impl IntoIterator<Item = (PeerId, Bandwidth)>) -> Vec<Upload> {
        grants
            .into_iter()
            .filter(|(_, bw)| *bw > 0)
            .map(|(to, bw)| self.upload(to, bw))
            .collect()
    }
}

pub trait UploadPolicy: Send {
    fn name(&self) -> &'static str;

    fn allocate(&mut self, ctx: &AllocationContext<'_>, rng: &mut dyn RngCore) -> Vec<Upload>;
}

pub fn policy_from_config(config: &PolicyConfig) -> Box<dyn UploadPolicy> {
    match config {
        PolicyConfig::Reciprocal(c) => Box::new(Reciprocal::new(c.clone())),
        PolicyConfig::PropShare(c) => Box::new(PropShare::new(c.clone())),
        PolicyConfig::RateAuction(c) => Box::new(RateAuction::new(c.initial_upload_rate)),
    }
}

/// Split `total` into `parts` shares as evenly as possible.
///
/// Shares are floored one at a time against what is left, so any remainder ends up in the
/// last shares. Sums to exactly `total` when `parts > 0`.
pub fn even_split(total: Bandwidth, parts: usize) -> Vec<Bandwidth> {
    let mut shares = Vec::with_capacity(parts);
    let mut left = total;
    for remaining_parts in (1..=parts as u64).rev() {
        let share = left / remaining_parts;
        shares.push(share);
        left -= share;
    }
    shares
}
