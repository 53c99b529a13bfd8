//! Tool call, result, and descriptor types.
//!
//! Tool payloads and errors are explicit tagged enums so the orchestration
//! loop can pull evidence (retrieved chunks, employee levels, checked
//! amounts) out of results without re-parsing JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    corpus::{ApprovalRule, Employee},
    retrieval::ScoredChunk,
};

pub const EMPLOYEE_LOOKUP: &str = "employee_lookup";
pub const POLICY_SEARCH: &str = "policy_search";
pub const APPROVAL_THRESHOLD_CHECK: &str = "approval_threshold_check";

/// A single tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Model-assigned id, echoed back in the matching `ToolResult`.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Identity of the call ignoring its id.
    ///
    /// `serde_json::Map` keeps keys sorted, so two calls with the same
    /// arguments in a different key order share a fingerprint.
    pub fn fingerprint(&self) -> String {
        format!("{}:{}", self.name, self.arguments)
    }

    /// The dollar amount an `approval_threshold_check` call asks about.
    pub fn requested_amount(&self) -> Option<f64> {
        if self.name != APPROVAL_THRESHOLD_CHECK {
            return None;
        }
        self.arguments
            .get("amount")
            .and_then(Value::as_f64)
            .filter(|a| a.is_finite() && *a > 0.0)
    }
}

/// Typed tool failures. Every failure a tool can produce ends up here.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ToolError {
    /// Arguments did not match the tool's declared input schema.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// The tool timed out or its backing data was unavailable.
    #[error("tool unavailable: {message}")]
    ToolUnavailable { message: String },

    #[error("unknown tool '{name}'")]
    UnknownTool { name: String },

    #[error("employee '{employee_id}' not found")]
    NotFound { employee_id: String },

    #[error("no approval rule for expense type '{expense_type}' at level '{level}'")]
    NoRuleFound { expense_type: String, level: String },

    /// The same call was already dispatched earlier in this request.
    #[error("identical call already made in round {round}; reuse that result")]
    DuplicateCall { round: u32 },
}

impl ToolError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::ToolUnavailable { .. } => "tool_unavailable",
            Self::UnknownTool { .. } => "unknown_tool",
            Self::NotFound { .. } => "not_found",
            Self::NoRuleFound { .. } => "no_rule_found",
            Self::DuplicateCall { .. } => "duplicate_call",
        }
    }
}

/// Output of `policy_search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub threshold: f32,
    /// True when no chunk met the threshold; the model must not answer from
    /// policy text in that case.
    pub insufficient_information: bool,
    pub results: Vec<ScoredChunk>,
}

/// Output of `approval_threshold_check`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalCheck {
    pub employee_id: String,
    pub employee_level: String,
    pub expense_type: String,
    pub amount: f64,
    pub requires_approval: bool,
    pub threshold_amount: f64,
    pub applicable_rule: ApprovalRule,
    /// Level that must sign off, present only when approval is required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_approver_level: Option<String>,
}

/// Successful tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ToolPayload {
    Employee(Employee),
    PolicySearch(SearchResults),
    ApprovalCheck(ApprovalCheck),
}

/// Payload or error: the two ways a dispatch can end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Payload(ToolPayload),
    Error(ToolError),
}

impl From<Result<ToolPayload, ToolError>> for ToolOutcome {
    fn from(result: Result<ToolPayload, ToolError>) -> Self {
        match result {
            Ok(payload) => Self::Payload(payload),
            Err(error) => Self::Error(error),
        }
    }
}

/// The result of one dispatch, matched to its call by `call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn new(call: &ToolCall, outcome: impl Into<ToolOutcome>) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            outcome: outcome.into(),
        }
    }

    pub fn payload(&self) -> Option<&ToolPayload> {
        match &self.outcome {
            ToolOutcome::Payload(p) => Some(p),
            ToolOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ToolError> {
        match &self.outcome {
            ToolOutcome::Payload(_) => None,
            ToolOutcome::Error(e) => Some(e),
        }
    }
}

/// What a caller (model or transport) needs to invoke a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema document for the tool's arguments.
    pub input_schema: Value,
}
