//! Trail link and sealed-trail types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_contracts::decision::TrailRecord;

/// One link of a request's hash chain.
///
/// `this_hash` commits to the request id, the position, the previous link,
/// and the record. Changing any of them breaks this link and every later
/// `prev_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailLink {
    /// Position in the chain, starting at 0.
    pub sequence: u64,
    pub request_id: String,
    pub record: TrailRecord,
    /// Hash of the previous link, or `GENESIS_HASH` for the first.
    pub prev_hash: String,
    pub this_hash: String,
}

impl TrailLink {
    /// `prev_hash` of the first link in every chain: 64 hex zeros.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// The complete, sealed trail of one request.
///
/// Held in memory and handed back with the decision; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTrail {
    pub request_id: String,
    pub links: Vec<TrailLink>,
    pub sealed_at: Option<DateTime<Utc>>,
    /// `this_hash` of the last link; empty for an empty trail.
    pub terminal_hash: String,
}

impl DecisionTrail {
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &TrailRecord> {
        self.links.iter().map(|l| &l.record)
    }
}
