use rand::RngCore;
use tatpeer_core::{
    PeerId,
    messages::{Bandwidth, Upload},
};
use tracing::trace;

use super::{AllocationContext, UploadPolicy};

/// BitTyrant-style auction: admit requesters by best download-per-upload ratio, paying
/// each one exactly its estimated price until the budget runs out.
pub struct RateAuction {
    /// Used instead of an upload estimate that is zero or not a number.
    fallback_upload: f64,
}

struct Bid {
    peer: PeerId,
    ratio: f64,
    price: Bandwidth,
}

impl RateAuction {
    pub fn new(fallback_upload: f64) -> Self {
        Self { fallback_upload }
    }

    fn bid(&self, ctx: &AllocationContext<'_>, peer: PeerId) -> Bid {
        let est = ctx.estimator.estimate(&peer);
        let upload = if est.upload.is_finite() && est.upload > 0. {
            est.upload
        } else {
            self.fallback_upload
        };
        Bid {
            ratio: est.download.max(0.) / upload,
            // Paying less than the estimate would not keep the peer, so round up.
            price: upload.ceil() as Bandwidth,
            peer,
        }
    }
}

impl UploadPolicy for RateAuction {
    fn name(&self) -> &'static str {
        "rate_auction"
    }

    fn allocate(&mut self, ctx: &AllocationContext<'_>, _rng: &mut dyn RngCore) -> Vec<Upload> {
        let mut bids: Vec<Bid> = ctx
            .requesters()
            .into_iter()
            .map(|p| self.bid(ctx, p))
            .collect();
        bids.sort_by(|a, b| b.ratio.total_cmp(&a.ratio));

        let mut left = ctx.budget;
        let mut grants = Vec::new();
        for bid in bids {
            if bid.price > left {
                trace!(peer = %bid.peer, price = bid.price, left, "out of budget");
                break;
            }
            left -= bid.price;
            trace!(peer = %bid.peer, ratio = bid.ratio, price = bid.price, "admitted");
            grants.push((bid.peer, bid.price));
        }
        ctx.uploads(grants)
    }
}
