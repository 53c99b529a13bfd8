//! # warden-core
//!
//! The reasoning runtime of the Warden policy pipeline.
//!
//! This crate provides:
//! - The capability traits (`ModelClient`, `Embedder`, `ToolDispatcher`,
//!   `DecisionFinalizer`, `TrailWriter`)
//! - The prompt material the model is seeded with
//! - The `Orchestrator` that runs the bounded tool-augmented loop
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_core::{Orchestrator, traits::{ModelClient, ToolDispatcher, DecisionFinalizer}};
//! ```

pub mod orchestrator;
pub mod prompts;
pub mod traits;

pub use orchestrator::{LoopOutcome, Orchestrator};
