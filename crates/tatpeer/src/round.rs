//! The per-round driver.
//!
//! The harness calls [`Agent::requests`] and then [`Agent::uploads`] once per round, in
//! that order. Anything else is a harness bug and is reported as
//! [`Error::PhaseMismatch`].

use rand::{RngCore, SeedableRng, rngs::StdRng};
use tatpeer_core::{
    Error, PeerId, Result,
    config::{PeerConfig, PolicyConfig},
    history::History,
    messages::{PeerView, Request, Upload},
    pieces::PieceCompletion,
};
use tracing::{debug, debug_span};

use crate::{
    allocator::{AllocationContext, UploadPolicy, policy_from_config},
    estimator::{RateEstimate, RateEstimator, SnapshotEstimator, estimator_from_config},
    piece_selector::PieceSelector,
    rarity::RarityIndex,
};

/// Two-phase decision interface driven by the swarm harness.
pub trait Agent {
    fn id(&self) -> &PeerId;

    /// What to ask other peers for this round.
    fn requests(&mut self, peers: &[PeerView], history: &History) -> Result<Vec<Request>>;

    /// Whom to upload to this round, given the requests other peers sent us.
    fn uploads(
        &mut self,
        requests: &[Request],
        peers: &[PeerView],
        history: &History,
    ) -> Result<Vec<Upload>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Requesting,
    Uploading,
}

impl RoundPhase {
    pub fn name(&self) -> &'static str {
        match self {
            RoundPhase::Requesting => "requesting",
            RoundPhase::Uploading => "uploading",
        }
    }
}

pub struct RoundController<R = StdRng> {
    id: PeerId,
    config: PeerConfig,
    pieces: PieceCompletion,
    selector: PieceSelector,
    estimator: Box<dyn RateEstimator>,
    policy: Box<dyn UploadPolicy>,
    rng: R,
    phase: RoundPhase,
}

impl RoundController<StdRng> {
    pub fn from_seed(
        id: impl Into<PeerId>,
        config: PeerConfig,
        pieces: PieceCompletion,
        seed: u64,
    ) -> Result<Self> {
        Self::new(id, config, pieces, StdRng::seed_from_u64(seed))
    }
}

impl<R: RngCore> RoundController<R> {
    pub fn new(
        id: impl Into<PeerId>,
        config: PeerConfig,
        pieces: PieceCompletion,
        rng: R,
    ) -> Result<Self> {
        config.validate()?;
        if pieces.blocks_per_piece() != config.blocks_per_piece {
            return Err(Error::InvalidConfig(format!(
                "piece state has {} blocks per piece, config says {}",
                pieces.blocks_per_piece(),
                config.blocks_per_piece
            )));
        }
        let estimator: Box<dyn RateEstimator> = match &config.policy {
            PolicyConfig::RateAuction(c) => estimator_from_config(c),
            // Only the auction reads estimates. The others still get a snapshot estimator
            // so the update step is the same for every policy.
            _ => Box::new(SnapshotEstimator::new(RateEstimate {
                download: 0.,
                upload: config.upload_bandwidth as f64,
            })),
        };
        let policy = policy_from_config(&config.policy);
        Ok(Self::with_parts(id, config, pieces, estimator, policy, rng))
    }

    /// Assemble a controller from explicit parts, e.g. with pre-seeded estimator or
    /// optimistic unchoke state.
    pub fn with_parts(
        id: impl Into<PeerId>,
        config: PeerConfig,
        pieces: PieceCompletion,
        estimator: Box<dyn RateEstimator>,
        policy: Box<dyn UploadPolicy>,
        rng: R,
    ) -> Self {
        Self {
            id: id.into(),
            selector: PieceSelector::new(config.max_requests_per_peer),
            config,
            pieces,
            estimator,
            policy,
            rng,
            phase: RoundPhase::Requesting,
        }
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    pub fn pieces(&self) -> &PieceCompletion {
        &self.pieces
    }

    /// The harness applies received blocks through this between rounds.
    pub fn pieces_mut(&mut self) -> &mut PieceCompletion {
        &mut self.pieces
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn estimate(&self, peer: &PeerId) -> RateEstimate {
        self.estimator.estimate(peer)
    }

    fn enter(&mut self, expected: RoundPhase, next: RoundPhase) -> Result<()> {
        if self.phase != expected {
            return Err(Error::PhaseMismatch {
                expected: expected.name(),
                actual: self.phase.name(),
            });
        }
        self.phase = next;
        Ok(())
    }
}

impl<R: RngCore> Agent for RoundController<R> {
    fn id(&self) -> &PeerId {
        &self.id
    }

    fn requests(&mut self, peers: &[PeerView], history: &History) -> Result<Vec<Request>> {
        self.enter(RoundPhase::Requesting, RoundPhase::Uploading)?;
        let _span = debug_span!("peer", id = %self.id, round = history.current_round()).entered();

        let rarity = RarityIndex::from_peers(peers);
        let requests = self
            .selector
            .select(&self.id, &self.pieces, peers, &rarity, &mut self.rng);
        debug!(
            requests = requests.len(),
            peers = peers.len(),
            needed = self.pieces.needed_pieces().count(),
            "decided requests"
        );
        Ok(requests)
    }

    fn uploads(
        &mut self,
        requests: &[Request],
        peers: &[PeerView],
        history: &History,
    ) -> Result<Vec<Upload>> {
        self.enter(RoundPhase::Uploading, RoundPhase::Requesting)?;
        let round = history.current_round();
        let _span = debug_span!("peer", id = %self.id, round).entered();

        self.estimator.update(&self.id, history);
        let ctx = AllocationContext {
            me: &self.id,
            round,
            requests,
            peers,
            history,
            budget: self.config.upload_bandwidth,
            total_pieces: self.pieces.total_pieces(),
            estimator: self.estimator.as_ref(),
        };
        let uploads = self.policy.allocate(&ctx, &mut self.rng);
        debug!(
            policy = self.policy.name(),
            incoming = requests.len(),
            uploads = uploads.len(),
            granted = uploads.iter().map(|u| u.bandwidth).sum::<u64>(),
            "decided uploads"
        );
        Ok(uploads)
    }
}

#[cfg(test)]
mod tests {
    use tatpeer_core::{
        PieceIndex,
        config::{RateAuctionConfig, ReciprocalConfig},
        messages::Download,
    };

    use super::*;
    use crate::allocator::{OptimisticUnchokeState, Reciprocal};

    fn config(policy: PolicyConfig) -> PeerConfig {
        PeerConfig {
            blocks_per_piece: 4,
            max_requests_per_peer: 2,
            upload_bandwidth: 30,
            policy,
        }
    }

    fn req(from: &str) -> Request {
        Request {
            requester_id: from.into(),
            peer_id: "me".into(),
            piece: PieceIndex::new(0),
            start_block: 0,
        }
    }

    #[test]
    fn test_phase_order_enforced() {
        let mut c = RoundController::from_seed(
            "me",
            config(Default::default()),
            PieceCompletion::empty(3, 4),
            0,
        )
        .unwrap();
        let h = History::new();
        assert_eq!(
            c.uploads(&[], &[], &h),
            Err(Error::PhaseMismatch {
                expected: "uploading",
                actual: "requesting"
            })
        );
        c.requests(&[], &h).unwrap();
        assert_eq!(c.phase(), RoundPhase::Uploading);
        assert!(c.requests(&[], &h).is_err());
        c.uploads(&[], &[], &h).unwrap();
        assert_eq!(c.phase(), RoundPhase::Requesting);
    }

    #[test]
    fn test_cold_start() {
        for policy in [
            PolicyConfig::Reciprocal(Default::default()),
            PolicyConfig::PropShare(Default::default()),
            PolicyConfig::RateAuction(Default::default()),
        ] {
            let mut c = RoundController::from_seed(
                "me",
                config(policy.clone()),
                PieceCompletion::empty(3, 4),
                1,
            )
            .unwrap();
            assert_eq!(c.policy_name(), policy.name());
            let h = History::new();
            let peers = vec![PeerView::new("Seed0", [0, 1, 2])];
            let requests = c.requests(&peers, &h).unwrap();
            assert_eq!(requests.len(), 2);
            assert!(c.uploads(&[], &peers, &h).unwrap().is_empty());
        }
    }

    #[test]
    fn test_blocks_per_piece_mismatch() {
        let r = RoundController::from_seed(
            "me",
            config(Default::default()),
            PieceCompletion::empty(3, 8),
            0,
        );
        assert!(matches!(r, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_estimator_updated_before_allocation() {
        let cfg = config(PolicyConfig::RateAuction(RateAuctionConfig {
            initial_upload_rate: 10.,
            alpha: 0.5,
            ..Default::default()
        }));
        let mut c =
            RoundController::from_seed("me", cfg, PieceCompletion::empty(1, 4), 2).unwrap();
        let mut h = History::new();
        h.record_round(
            vec![Download {
                from_id: "giver".into(),
                to_id: "me".into(),
                piece: PieceIndex::new(0),
                blocks: 3,
            }],
            vec![Upload {
                from_id: "me".into(),
                to_id: "taker".into(),
                bandwidth: 10,
            }],
        );
        c.requests(&[], &h).unwrap();
        let uploads = c.uploads(&[req("taker"), req("giver")], &[], &h).unwrap();
        assert_eq!(c.estimate(&"giver".into()).download, 3.);
        assert_eq!(c.estimate(&"taker".into()).upload, 15.);
        // taker: 15/15 = 1.0, giver: 3/10 = 0.3.
        assert_eq!(
            uploads
                .iter()
                .map(|u| (u.to_id.as_str(), u.bandwidth))
                .collect::<Vec<_>>(),
            vec![("taker", 15), ("giver", 10)]
        );
    }

    #[test]
    fn test_injected_optimistic_state() {
        let rc = ReciprocalConfig::default();
        let policy = Reciprocal::with_state(
            rc.clone(),
            OptimisticUnchokeState {
                peer: Some("friend".into()),
                chosen_in_round: Some(0),
            },
        );
        let mut c = RoundController::with_parts(
            "me",
            config(PolicyConfig::Reciprocal(rc)),
            PieceCompletion::empty(1, 4),
            Box::new(SnapshotEstimator::new(RateEstimate {
                download: 0.,
                upload: 30.,
            })),
            Box::new(policy),
            StdRng::seed_from_u64(3),
        );
        let mut h = History::new();
        h.record_round(vec![], vec![]);
        c.requests(&[], &h).unwrap();
        let uploads = c.uploads(&[req("friend"), req("other")], &[], &h).unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].to_id.as_str(), "friend");
        assert_eq!(uploads[0].bandwidth, 30);
    }
}
