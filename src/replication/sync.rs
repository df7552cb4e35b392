//! Anti-entropy round orchestration: the thin seam between the maintenance daemons (§10.1)
//! and the two strategies `Ring` implements (§4.5). The basic root-hash strategy is the
//! mandatory, default one driven by the anti-entropy timer; the Merkle refinement is
//! available on the same seam but not wired to any timer by default (§9's pinned open
//! question).

use crate::ring::Ring;

/// Run one `SyncData` round: the mandatory, default anti-entropy strategy.
pub async fn run_basic_round(ring: &Ring) {
    ring.sync_data().await;
}

/// Run one `ForwardSync` round: the optional Merkle-refinement strategy. Not called by
/// [`crate::service`]'s default daemon set; a deployment that wants leaf-granular diffing
/// instead of whole-range transfer can spawn this on its own schedule.
pub async fn run_forward_sync_round(ring: &Ring) {
    if let Err(e) = ring.forward_sync().await {
        tracing::warn!(error = %e, "forward_sync round failed");
    }
}
