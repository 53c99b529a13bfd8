//! # warden-audit
//!
//! Per-request decision trails, SHA-256 hash-chained.
//!
//! ## Overview
//!
//! Every model turn, tool dispatch, and terminal resolution of a request is
//! appended to that request's `RequestTrail` as a `TrailLink` pointing at the
//! hash of the link before it. Altering any stored record breaks the chain
//! and `verify_chain` reports it. Trails live only as long as the request
//! that produced them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_audit::RequestTrail;
//! use warden_core::traits::TrailWriter;
//!
//! let trail = RequestTrail::new(request_id.to_string());
//! trail.write(&record)?;
//! trail.finalize(trail.request_id())?;
//!
//! assert!(trail.verify_integrity());
//! let sealed = trail.export();
//! ```

pub mod chain;
pub mod event;
pub mod memory;

pub use chain::{hash_link, verify_chain};
pub use event::{DecisionTrail, TrailLink};
pub use memory::RequestTrail;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use warden_contracts::{
        conversation::ModelTurn,
        decision::{PolicyDecision, Resolution, TrailEntry, TrailRecord},
        error::WardenError,
    };
    use warden_core::traits::TrailWriter;

    use super::{verify_chain, RequestTrail, TrailLink};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn turn(round: u32, text: &str) -> TrailRecord {
        TrailRecord::new(
            round,
            TrailEntry::ModelResponded {
                turn: ModelTurn::Final { text: text.to_string() },
            },
        )
    }

    fn filled(request_id: &str) -> RequestTrail {
        let trail = RequestTrail::new(request_id);
        trail.write(&turn(0, "first")).unwrap();
        trail.write(&turn(1, "second")).unwrap();
        trail.write(&turn(2, "third")).unwrap();
        trail
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    #[test]
    fn sequential_writes_form_a_valid_chain() {
        assert!(filled("req-integrity").verify_integrity());
    }

    #[test]
    fn editing_a_record_is_detected() {
        let trail = filled("req-tamper");
        {
            let mut state = trail.state.lock().unwrap();
            state.links[0].record.entry = TrailEntry::ModelFailed {
                reason: "rewritten".to_string(),
            };
        }
        assert!(!trail.verify_integrity());
    }

    #[test]
    fn dropping_a_link_is_detected() {
        let mut links = filled("req-drop").export().links;
        links.remove(1);
        assert!(!verify_chain(&links));
    }

    #[test]
    fn first_link_points_at_genesis_and_sequence_is_dense() {
        let sealed = filled("req-seq").export();
        assert_eq!(sealed.links[0].prev_hash, TrailLink::GENESIS_HASH);
        for (i, link) in sealed.links.iter().enumerate() {
            assert_eq!(link.sequence, i as u64);
        }
        assert_eq!(sealed.terminal_hash, sealed.links[2].this_hash);
    }

    #[test]
    fn same_records_in_different_requests_hash_differently() {
        let a = filled("req-a").export();
        let b = filled("req-b").export();
        assert_ne!(a.links[0].this_hash, b.links[0].this_hash);
    }

    #[test]
    fn sealed_trail_rejects_writes() {
        let trail = filled("req-seal");
        trail
            .write(&TrailRecord::new(
                3,
                TrailEntry::Resolved {
                    resolution: Resolution::Answered,
                    decision: PolicyDecision::fallback("done"),
                },
            ))
            .unwrap();
        trail.finalize("req-seal").unwrap();

        assert!(trail.is_sealed());
        assert!(matches!(
            trail.write(&turn(4, "late")),
            Err(WardenError::TrailWriteFailed { .. })
        ));
        let sealed = trail.export();
        assert_eq!(sealed.len(), 4);
        assert!(sealed.sealed_at.is_some());
    }

    #[test]
    fn empty_trail_is_valid() {
        let trail = RequestTrail::new("req-empty");
        assert!(trail.verify_integrity());
        assert!(trail.export().terminal_hash.is_empty());
        assert!(verify_chain(&[]));
    }
}
