//! Request/response contract and the per-request trail record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    conversation::ModelTurn,
    guard::{RejectionReason, ValidationResult},
    tool::{ToolCall, ToolResult},
};

/// Unique identifier for one pipeline request.
///
/// Appears in every log line and trail record produced while the request
/// is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub uuid::Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A policy question from a front end or the evaluation harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
}

impl PolicyRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            employee_id: None,
        }
    }

    pub fn for_employee(mut self, employee_id: impl Into<String>) -> Self {
        self.employee_id = Some(employee_id.into());
        self
    }
}

/// The structured, auditable answer to a policy question.
///
/// Serialized as a flat mapping; this is the only shape a caller ever sees,
/// failures included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub approved: bool,
    pub reason: String,
    pub policy_ref: String,
    /// Estimated correctness in `[0, 1]`.
    pub confidence: f64,
    pub requires_human_review: bool,
    #[serde(default)]
    pub employee_level: Option<String>,
}

impl PolicyDecision {
    /// Reference used when a decision cites no policy.
    pub const NO_POLICY: &'static str = "N/A";

    /// The safe decision produced when the pipeline cannot reach an answer.
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: reason.into(),
            policy_ref: Self::NO_POLICY.to_string(),
            confidence: 0.0,
            requires_human_review: true,
            employee_level: None,
        }
    }

    /// The decision returned for input the guardrail refused.
    pub fn rejected_input(reason: RejectionReason) -> Self {
        Self::fallback(format!(
            "The request could not be processed: input rejected ({reason})."
        ))
    }
}

/// Why a request fell back to the safe decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackCause {
    /// The loop hit its iteration cap without an accepted answer.
    IterationCap,
    ModelUnavailable,
    /// The model's answer failed validation twice.
    SchemaViolation,
}

impl FallbackCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IterationCap => "iteration_cap",
            Self::ModelUnavailable => "model_unavailable",
            Self::SchemaViolation => "schema_violation",
        }
    }
}

/// The terminal condition that produced a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum Resolution {
    Answered,
    InputRejected { reason: RejectionReason },
    Fallback { cause: FallbackCause },
}

/// What happened at one point of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrailEntry {
    InputScreened { result: ValidationResult },
    ModelResponded { turn: ModelTurn },
    ModelFailed { reason: String },
    ToolDispatched { call: ToolCall, result: ToolResult },
    AnswerRejected { reason: String },
    Resolved { resolution: Resolution, decision: PolicyDecision },
}

/// One immutable record in a request's decision trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailRecord {
    /// Tool round the record belongs to (0 before the first round completes).
    pub round: u32,
    pub entry: TrailEntry,
    pub timestamp: DateTime<Utc>,
}

impl TrailRecord {
    pub fn new(round: u32, entry: TrailEntry) -> Self {
        Self {
            round,
            entry,
            timestamp: Utc::now(),
        }
    }
}
