//! Capability traits for the Warden pipeline.
//!
//! These traits mark the trust boundary of a request:
//!
//! - `ModelClient`       : untrusted reasoning (an LLM provider)
//! - `Embedder`          : external embedding provider
//! - `ToolDispatcher`    : trusted, schema-checked tool execution
//! - `DecisionFinalizer` : trusted checker for the model's final answer
//! - `TrailWriter`       : per-request, append-only decision trail
//!
//! The orchestrator wires them together. Nothing the model says reaches a
//! caller without passing through a `DecisionFinalizer`.

use async_trait::async_trait;

use warden_contracts::{
    conversation::{Evidence, ModelTurn, Turn},
    decision::{PolicyDecision, TrailRecord},
    error::WardenResult,
    tool::{ToolCall, ToolDescriptor, ToolResult},
};

/// The language-model capability: produce the next turn of a conversation.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Return either tool requests or a final answer for `turns`.
    ///
    /// Errors are reported as `WardenError::ModelUnavailable`; the
    /// orchestrator routes them to the fallback decision.
    async fn next_turn(&self, turns: &[Turn], tools: &[ToolDescriptor]) -> WardenResult<ModelTurn>;
}

/// The embedding capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> WardenResult<Vec<f32>>;
}

/// Executes named tools on behalf of the model.
///
/// Implementations never fail: every problem, from malformed arguments to a
/// timeout, is folded into the returned `ToolResult` as a `ToolError`.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    /// Name, description, and input schema of every tool on offer.
    fn descriptors(&self) -> Vec<ToolDescriptor>;

    async fn dispatch(&self, call: &ToolCall) -> ToolResult;
}

/// Validates, repairs, and escalates the model's final answer.
pub trait DecisionFinalizer: Send + Sync {
    /// Turn raw model text into a decision checked against `evidence`.
    ///
    /// Returns `WardenError::SchemaViolation` when the text does not contain
    /// a well-formed decision; every other problem (bad citation, low
    /// confidence, PII) is repaired in the returned decision.
    fn finalize(&self, raw_answer: &str, evidence: &Evidence) -> WardenResult<PolicyDecision>;
}

/// Append-only sink for one request's trail.
pub trait TrailWriter: Send + Sync {
    fn write(&self, record: &TrailRecord) -> WardenResult<()>;

    /// Seal the trail once the request has a terminal outcome.
    fn finalize(&self, request_id: &str) -> WardenResult<()>;
}
