//! # warden-retrieval
//!
//! The retrieval side of the Warden pipeline.
//!
//! - `chunking`: split policy sections into overlapping token windows
//! - `embed`: `HashingEmbedder`, a deterministic offline `Embedder`
//! - `index`: `RetrievalIndex`, built once and queried with a confidence gate
//!
//! An index never pads its results: when nothing clears the threshold the
//! result is empty, and callers treat that as insufficient information.

pub mod chunking;
pub mod embed;
pub mod index;

pub use embed::HashingEmbedder;
pub use index::RetrievalIndex;
