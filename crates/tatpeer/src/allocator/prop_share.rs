use itertools::Itertools;
use rand::{RngCore, seq::IndexedRandom};
use tatpeer_core::{
    PeerId,
    config::PropShareConfig,
    messages::{Bandwidth, Upload},
};
use tracing::trace;

use super::{AllocationContext, UploadPolicy, even_split};

/// Proportional share: each requester that sent us blocks last round gets a slice of the
/// budget proportional to what it sent. A small reserve goes to one random requester that
/// sent nothing.
pub struct PropShare {
    config: PropShareConfig,
}

impl PropShare {
    pub fn new(config: PropShareConfig) -> Self {
        Self { config }
    }

    fn reserve(&self, budget: Bandwidth) -> Bandwidth {
        let reserve = (budget as u128 * self.config.optimistic_share_percent as u128) / 100;
        (reserve as Bandwidth).min(budget)
    }
}

/// Split `budget` proportionally to `contributions`.
///
/// Each share is rounded, then removed from both the budget and the contribution pool
/// before computing the next one, so the last contributor absorbs the rounding and the
/// whole budget is handed out.
pub fn proportional_split(budget: Bandwidth, contributions: &[u64]) -> Vec<Bandwidth> {
    let mut pool: u64 = contributions.iter().sum();
    let mut left = budget;
    let mut shares = Vec::with_capacity(contributions.len());
    for c in contributions.iter().copied() {
        if pool == 0 {
            shares.push(0);
            continue;
        }
        let share = (c as f64 / pool as f64 * left as f64).round_ties_even() as Bandwidth;
        let share = share.min(left);
        shares.push(share);
        left -= share;
        pool -= c;
    }
    shares
}

impl UploadPolicy for PropShare {
    fn name(&self) -> &'static str {
        "prop_share"
    }

    fn allocate(&mut self, ctx: &AllocationContext<'_>, rng: &mut dyn RngCore) -> Vec<Upload> {
        let requesters = ctx.requesters();
        if requesters.is_empty() {
            return Vec::new();
        }

        let received = ctx.history.blocks_received_last_round();
        let contributors: Vec<(&PeerId, u64)> = requesters
            .iter()
            .filter_map(|p| received.get(p).filter(|b| **b > 0).map(|b| (p, *b)))
            .sorted_by_key(|(_, b)| *b)
            .collect();

        if contributors.is_empty() {
            trace!("no reciprocating requesters, splitting evenly");
            let shares = even_split(ctx.budget, requesters.len());
            return ctx.uploads(requesters.into_iter().zip(shares));
        }

        let freeloaders: Vec<&PeerId> = requesters
            .iter()
            .filter(|p| !contributors.iter().any(|(c, _)| c == p))
            .collect();
        let reserve = if freeloaders.is_empty() {
            0
        } else {
            self.reserve(ctx.budget)
        };

        let amounts: Vec<u64> = contributors.iter().map(|(_, b)| *b).collect();
        let shares = proportional_split(ctx.budget - reserve, &amounts);
        let mut grants: Vec<(PeerId, Bandwidth)> = contributors
            .iter()
            .map(|(p, _)| (*p).clone())
            .zip(shares)
            .collect();

        if let Some(lucky) = freeloaders.choose(rng) {
            trace!(peer = %lucky, reserve, "optimistic unchoke");
            grants.push(((*lucky).clone(), reserve));
        }
        ctx.uploads(grants)
    }
}
