//! In-memory `TrailWriter`.
//!
//! One `RequestTrail` is created per request and dropped with it. Writes and
//! the seal both take the interior `Mutex`, so the trail can be shared with
//! the orchestrator by reference while tool rounds run concurrently.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use warden_contracts::{
    decision::TrailRecord,
    error::{WardenError, WardenResult},
};
use warden_core::traits::TrailWriter;

use crate::{
    chain::{hash_link, verify_chain},
    event::{DecisionTrail, TrailLink},
};

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct TrailState {
    pub(crate) links: Vec<TrailLink>,
    pub(crate) last_hash: String,
    pub(crate) sealed_at: Option<DateTime<Utc>>,
}

// ── Public writer ─────────────────────────────────────────────────────────────

/// Append-only, hash-chained trail for a single request.
///
/// After `finalize` the trail is sealed and further writes fail.
pub struct RequestTrail {
    request_id: String,
    pub(crate) state: Mutex<TrailState>,
}

impl RequestTrail {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            state: Mutex::new(TrailState {
                links: Vec::new(),
                last_hash: TrailLink::GENESIS_HASH.to_string(),
                sealed_at: None,
            }),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Snapshot of the trail so far.
    pub fn export(&self) -> DecisionTrail {
        let state = self.state.lock().expect("trail state lock poisoned");
        DecisionTrail {
            request_id: self.request_id.clone(),
            links: state.links.clone(),
            sealed_at: state.sealed_at,
            terminal_hash: state
                .links
                .last()
                .map(|l| l.this_hash.clone())
                .unwrap_or_default(),
        }
    }

    pub fn verify_integrity(&self) -> bool {
        let state = self.state.lock().expect("trail state lock poisoned");
        verify_chain(&state.links)
    }

    pub fn is_sealed(&self) -> bool {
        let state = self.state.lock().expect("trail state lock poisoned");
        state.sealed_at.is_some()
    }
}

// ── TrailWriter impl ──────────────────────────────────────────────────────────

impl TrailWriter for RequestTrail {
    fn write(&self, record: &TrailRecord) -> WardenResult<()> {
        let mut state = self.state.lock().map_err(|e| WardenError::TrailWriteFailed {
            reason: format!("trail state lock poisoned: {}", e),
        })?;
        if state.sealed_at.is_some() {
            return Err(WardenError::TrailWriteFailed {
                reason: format!("trail for request '{}' is sealed", self.request_id),
            });
        }

        let sequence = state.links.len() as u64;
        let prev_hash = state.last_hash.clone();
        let this_hash = hash_link(&self.request_id, sequence, record, &prev_hash)?;

        debug!(request_id = %self.request_id, sequence, "trail record appended");
        state.links.push(TrailLink {
            sequence,
            request_id: self.request_id.clone(),
            record: record.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.last_hash = this_hash;
        Ok(())
    }

    fn finalize(&self, request_id: &str) -> WardenResult<()> {
        let mut state = self.state.lock().map_err(|e| WardenError::TrailWriteFailed {
            reason: format!("trail state lock poisoned: {}", e),
        })?;
        if state.sealed_at.is_none() {
            state.sealed_at = Some(Utc::now());
        }

        info!(
            request_id = %request_id,
            records = state.links.len(),
            terminal_hash = %state.last_hash,
            "decision trail sealed"
        );
        Ok(())
    }
}
