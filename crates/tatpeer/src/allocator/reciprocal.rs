use std::cmp::Reverse;

use itertools::Itertools;
use rand::{
    RngCore,
    seq::{IndexedRandom, SliceRandom},
};
use tatpeer_core::{PeerId, config::ReciprocalConfig, messages::Upload};
use tracing::trace;

use super::{AllocationContext, UploadPolicy, even_split};

/// The optimistically unchoked peer, kept across rounds until the next reselection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimisticUnchokeState {
    pub peer: Option<PeerId>,
    pub chosen_in_round: Option<u32>,
}

/// Tit-for-tat: unchoke the requesters that sent us the most recently, plus one
/// optimistically unchoked peer, and split the budget evenly between them.
pub struct Reciprocal {
    config: ReciprocalConfig,
    state: OptimisticUnchokeState,
}

impl Reciprocal {
    pub fn new(config: ReciprocalConfig) -> Self {
        Self::with_state(config, Default::default())
    }

    pub fn with_state(config: ReciprocalConfig, state: OptimisticUnchokeState) -> Self {
        Self { config, state }
    }

    pub fn state(&self) -> &OptimisticUnchokeState {
        &self.state
    }

    fn reselection_due(&self, round: u32) -> bool {
        self.state.peer.is_none()
            || round.checked_rem(self.config.optimistic_interval)
                == Some(self.config.optimistic_phase)
    }

    fn reselect(
        &mut self,
        ctx: &AllocationContext<'_>,
        requesters: &[PeerId],
        rng: &mut dyn RngCore,
    ) {
        let peer = if !requesters.is_empty() {
            requesters.choose(rng).cloned()
        } else {
            let leechers: Vec<&PeerId> = ctx
                .peers
                .iter()
                .filter(|p| &p.id != ctx.me && !p.is_seed(ctx.total_pieces))
                .map(|p| &p.id)
                .collect();
            leechers.choose(rng).map(|p| (*p).clone())
        };
        trace!(round = ctx.round, ?peer, "optimistic unchoke reselected");
        self.state = OptimisticUnchokeState {
            peer,
            chosen_in_round: Some(ctx.round),
        };
    }
}

impl UploadPolicy for Reciprocal {
    fn name(&self) -> &'static str {
        "reciprocal"
    }

    fn allocate(&mut self, ctx: &AllocationContext<'_>, rng: &mut dyn RngCore) -> Vec<Upload> {
        let requesters = ctx.requesters();
        if self.reselection_due(ctx.round) {
            self.reselect(ctx, &requesters, rng);
        }
        if requesters.is_empty() {
            return Vec::new();
        }

        let optimistic = self.state.peer.as_ref();
        let mut chosen: Vec<PeerId> = Vec::new();
        if let Some(opt) = optimistic {
            if !self.config.optimistic_requires_request || requesters.contains(opt) {
                chosen.push(opt.clone());
            }
        }

        // Nothing to reciprocate in round 0.
        if ctx.round > 0 && self.config.unchoke_slots > 0 {
            let window = self.config.history_window.min(ctx.round);
            let received = ctx.history.blocks_received(ctx.round - window..ctx.round);
            let mut ranked: Vec<(&PeerId, u64)> = requesters
                .iter()
                .filter(|p| Some(*p) != optimistic)
                .filter_map(|p| received.get(p).filter(|b| **b > 0).map(|b| (p, *b)))
                .collect();
            ranked.shuffle(rng);
            chosen.extend(
                ranked
                    .into_iter()
                    .sorted_by_key(|(_, blocks)| Reverse(*blocks))
                    .take(self.config.unchoke_slots)
                    .map(|(p, _)| p.clone()),
            );
        }

        let shares = even_split(ctx.budget, chosen.len());
        ctx.uploads(chosen.into_iter().zip(shares))
    }
}
