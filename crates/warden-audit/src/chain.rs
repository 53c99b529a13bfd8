//! Hash-chain primitives.
//!
//! Hash input layout (bytes, in order):
//!   1. request_id as UTF-8
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 (64 hex chars)
//!   4. compact JSON of the record

use sha2::{Digest, Sha256};

use warden_contracts::{
    decision::TrailRecord,
    error::{WardenError, WardenResult},
};

use crate::event::TrailLink;

/// SHA-256 of one link's content, as lowercase hex.
pub fn hash_link(
    request_id: &str,
    sequence: u64,
    record: &TrailRecord,
    prev_hash: &str,
) -> WardenResult<String> {
    let record_json = serde_json::to_vec(record).map_err(|e| WardenError::TrailWriteFailed {
        reason: format!("trail record is not serializable: {}", e),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(request_id.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);
    Ok(hex::encode(hasher.finalize()))
}

/// True when every link points at its predecessor, carries the expected
/// sequence number, and hashes to its stored `this_hash`. An empty chain is
/// valid.
pub fn verify_chain(links: &[TrailLink]) -> bool {
    let mut expected_prev = TrailLink::GENESIS_HASH.to_string();

    for (position, link) in links.iter().enumerate() {
        if link.sequence != position as u64 || link.prev_hash != expected_prev {
            return false;
        }
        match hash_link(&link.request_id, link.sequence, &link.record, &link.prev_hash) {
            Ok(hash) if hash == link.this_hash => {}
            _ => return false,
        }
        expected_prev = link.this_hash.clone();
    }

    true
}
