//! # warden-guard
//!
//! The two trust boundaries around the reasoning loop.
//!
//! - [`input::InputGuardrail`] screens raw text before any model sees it:
//!   sanitization, length limits, injection signatures, encoded payloads.
//! - [`output::OutputGuardrail`] implements
//!   [`warden_core::traits::DecisionFinalizer`]. It validates the model's
//!   final answer in two phases:
//!
//! 1. **Structural**: JSON Schema validation via the `jsonschema` crate,
//!    then typed deserialization.
//! 2. **Semantic**: citation against retrieved evidence, confidence and
//!    high-value routing, PII redaction.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use warden_guard::{input::InputGuardrail, output::OutputGuardrail};
//!
//! let input = InputGuardrail::new(&config.guardrails)?;
//! let output = OutputGuardrail::new(&config.output)?;
//! ```

pub mod input;
pub mod output;
pub mod pii;

pub use input::InputGuardrail;
pub use output::OutputGuardrail;
