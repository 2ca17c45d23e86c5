//! Rarest-first request selection.
//!
//! For every peer (visited in random order) we take the pieces it offers that we still
//! need, shuffle them to break ties between equally rare pieces, then stable-sort by
//! rarity and keep at most `max_requests_per_peer`. Each kept piece yields exactly one
//! request starting at the first block we don't have yet.

use rand::{Rng, seq::SliceRandom};
use tatpeer_core::{
    PeerId, PieceIndex,
    messages::{PeerView, Request},
    pieces::PieceCompletion,
};
use tracing::trace;

use crate::rarity::RarityIndex;

#[derive(Debug, Clone, Copy)]
pub struct PieceSelector {
    max_requests_per_peer: usize,
}

impl PieceSelector {
    pub fn new(max_requests_per_peer: usize) -> Self {
        Self {
            max_requests_per_peer,
        }
    }

    pub fn select<R: Rng + ?Sized>(
        &self,
        me: &PeerId,
        completion: &PieceCompletion,
        peers: &[PeerView],
        rarity: &RarityIndex,
        rng: &mut R,
    ) -> Vec<Request> {
        let mut requests = Vec::new();
        if self.max_requests_per_peer == 0 {
            return requests;
        }

        let mut order: Vec<usize> = (0..peers.len()).collect();
        order.shuffle(rng);

        for peer in order.into_iter().map(|idx| &peers[idx]) {
            if &peer.id == me {
                continue;
            }
            let mut wanted = wanted_pieces(completion, peer);
            if wanted.is_empty() {
                continue;
            }
            wanted.shuffle(rng);
            // sort_by_key is stable, so the shuffle decides among equally rare pieces.
            wanted.sort_by_key(|p| rarity.get(*p));
            wanted.truncate(self.max_requests_per_peer);

            for piece in wanted {
                // Only needed pieces survive wanted_pieces(), so this is always Some.
                let Some(start_block) = completion.held_blocks(piece) else {
                    continue;
                };
                trace!(peer = %peer.id, %piece, start_block, "requesting");
                requests.push(Request {
                    requester_id: me.clone(),
                    peer_id: peer.id.clone(),
                    piece,
                    start_block,
                });
            }
        }
        requests
    }
}

/// Pieces offered by `peer` that we still need, ascending and without duplicates.
fn wanted_pieces(completion: &PieceCompletion, peer: &PeerView) -> Vec<PieceIndex> {
    let mut wanted: Vec<PieceIndex> = peer
        .available_pieces
        .iter()
        .copied()
        .filter(|p| completion.held_blocks(*p).is_some() && !completion.is_complete(*p))
        .collect();
    wanted.sort_unstable();
    wanted.dedup();
    wanted
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn me() -> PeerId {
        PeerId::new("me")
    }

    fn select(
        max: usize,
        completion: &PieceCompletion,
        peers: &[PeerView],
        seed: u64,
    ) -> Vec<Request> {
        let rarity = RarityIndex::from_peers(peers);
        let mut rng = StdRng::seed_from_u64(seed);
        PieceSelector::new(max).select(&me(), completion, peers, &rarity, &mut rng)
    }

    #[test]
    fn test_rarest_first() {
        // A=0 offered by 1 peer, B=1 by 3 peers, C=2 by 2 peers.
        let peers = vec![
            PeerView::new("target", [0, 1, 2]),
            PeerView::new("x", [1, 2]),
            PeerView::new("y", [1]),
        ];
        let completion = PieceCompletion::empty(3, 4);
        for seed in 0..20 {
            let requests = select(2, &completion, &peers, seed);
            let from_target: Vec<u32> = requests
                .iter()
                .filter(|r| r.peer_id.as_str() == "target")
                .map(|r| r.piece.get())
                .collect();
            assert_eq!(from_target, vec![0, 2], "seed={seed}");
        }
    }

    #[test]
    fn test_equally_rare_pieces_vary_with_seed() {
        let peers = vec![PeerView::new("target", [0, 1, 2, 3])];
        let completion = PieceCompletion::empty(4, 4);
        let chosen: HashSet<u32> = (0..20)
            .map(|seed| {
                let requests = select(1, &completion, &peers, seed);
                assert_eq!(requests.len(), 1);
                requests[0].piece.get()
            })
            .collect();
        assert!(chosen.len() > 1, "always picked {chosen:?}");
    }

    #[test]
    fn test_peer_visiting_order_varies_with_seed() {
        let peers = vec![PeerView::new("a", [0]), PeerView::new("b", [1])];
        let completion = PieceCompletion::empty(2, 4);
        let first: HashSet<PeerId> = (0..20)
            .map(|seed| {
                let requests = select(1, &completion, &peers, seed);
                assert_eq!(requests.len(), 2);
                requests[0].peer_id.clone()
            })
            .collect();
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_skips_complete_pieces_and_uses_held_offset() {
        let completion = PieceCompletion::from_counts(4, [4, 2, 0]);
        let peers = vec![PeerView::new("p", [0, 1, 2])];
        let requests = select(10, &completion, &peers, 1);
        assert_eq!(requests.len(), 2);
        for r in &requests {
            assert_ne!(r.piece.get(), 0);
            assert_eq!(Some(r.start_block), completion.held_blocks(r.piece));
            assert_eq!(r.requester_id, me());
        }
    }

    #[test]
    fn test_per_peer_cap() {
        let completion = PieceCompletion::empty(20, 2);
        let peers: Vec<PeerView> = (0..5)
            .map(|i| PeerView::new(format!("p{i}"), 0..20))
            .collect();
        let requests = select(3, &completion, &peers, 7);
        let mut per_peer: HashMap<PeerId, usize> = HashMap::new();
        for r in &requests {
            *per_peer.entry(r.peer_id.clone()).or_default() += 1;
        }
        assert_eq!(per_peer.len(), 5);
        assert!(per_peer.values().all(|c| *c == 3));
    }

    #[test]
    fn test_skip_peers_with_nothing_needed_and_self() {
        let completion = PieceCompletion::from_counts(4, [4, 0]);
        let peers = vec![
            PeerView::new("useless", [0]),
            PeerView::new("empty", []),
            PeerView::new("me", [1]),
            PeerView::new("unknown_piece", [42]),
        ];
        assert!(select(4, &completion, &peers, 3).is_empty());
        assert!(select(0, &PieceCompletion::empty(2, 4), &peers, 3).is_empty());
    }

    #[test]
    fn test_same_seed_same_requests() {
        let completion = PieceCompletion::from_counts(4, [0, 1, 2, 3, 0, 0, 1, 0]);
        let peers: Vec<PeerView> = (0..6)
            .map(|i| PeerView::new(format!("p{i}"), (0..8).filter(move |p| (p + i) % 3 != 0)))
            .collect();
        let a = select(2, &completion, &peers, 99);
        let b = select(2, &completion, &peers, 99);
        assert_eq!(a, b);

        // A different seed may reorder, but every request stays valid.
        let c: HashSet<_> = select(2, &completion, &peers, 100)
            .into_iter()
            .map(|r| (r.peer_id, r.piece, r.start_block))
            .collect();
        assert!(c
            .iter()
            .all(|(_, piece, start)| Some(*start) == completion.held_blocks(*piece)));
    }
}
