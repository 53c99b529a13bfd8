//! # warden-runtime
//!
//! Wires the Warden components into a runnable pipeline.
//!
//! - [`corpus`]: loads and validates the policy manual, employee roster,
//!   and approval rules.
//! - [`pipeline`]: input guardrail, retrieval index, tool registry,
//!   reasoning loop, and output guardrail behind one `handle()` call.
//! - [`offline_model`]: a deterministic `ModelClient` so the pipeline runs
//!   without a model provider.
//!
//! A bundled demo corpus and configuration ship with the crate; see
//! [`Corpus::demo`] and [`demo_config`].

pub mod corpus;
pub mod offline_model;
pub mod pipeline;

pub use corpus::Corpus;
pub use offline_model::OfflineReasoner;
pub use pipeline::{DecisionReport, Pipeline, RequestOutcome};

use warden_contracts::{config::WardenConfig, error::WardenResult};

const DEMO_CONFIG: &str = include_str!("../data/warden.toml");

/// Configuration tuned for the bundled corpus and the hashing embedder.
pub fn demo_config() -> WardenResult<WardenConfig> {
    WardenConfig::from_toml_str(DEMO_CONFIG)
}
