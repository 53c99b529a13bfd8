//! Per-request conversation state.
//!
//! A `ConversationState` is owned by exactly one in-flight request and is
//! dropped when that request completes. Nothing in it is shared.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    retrieval::ScoredChunk,
    tool::{ToolCall, ToolPayload, ToolResult},
};

/// One entry in the conversation sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    ToolResult {
        result: ToolResult,
    },
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }
}

/// What the model capability returns for one round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelTurn {
    /// The model wants tools run before it answers.
    ToolCalls {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        calls: Vec<ToolCall>,
    },
    /// The model produced its answer.
    Final { text: String },
}

/// Facts gathered from tool results that the output guardrail checks the
/// model's answer against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Every chunk any `policy_search` returned during the request, first
    /// occurrence wins.
    pub retrieved: Vec<ScoredChunk>,
    /// Level from the most recent successful employee lookup.
    pub employee_level: Option<String>,
    /// Largest amount passed to `approval_threshold_check`, whether or not
    /// the check succeeded.
    pub max_checked_amount: Option<f64>,
}

impl Evidence {
    pub fn cites(&self, reference: &str) -> Option<&ScoredChunk> {
        self.retrieved.iter().find(|c| c.is_cited_by(reference))
    }
}

/// The running state of one request's reasoning loop.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    turns: Vec<Turn>,
    /// Completed tool rounds.
    iteration: u32,
    /// Model invocations so far, including repair requests.
    model_calls: u32,
    results: Vec<ToolResult>,
    /// Call fingerprint → round it was first dispatched in.
    dispatched: HashMap<String, u32>,
    /// Amounts named by dispatched `approval_threshold_check` calls.
    requested_amounts: Vec<f64>,
}

impl ConversationState {
    /// Seed a conversation with instructions, examples, and the user query.
    pub fn seeded(system: &str, examples: Vec<Turn>, query: String) -> Self {
        let mut turns = Vec::with_capacity(examples.len() + 2);
        turns.push(Turn::system(system));
        turns.extend(examples);
        turns.push(Turn::User { content: query });
        Self {
            turns,
            ..Self::default()
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn model_calls(&self) -> u32 {
        self.model_calls
    }

    pub fn results(&self) -> &[ToolResult] {
        &self.results
    }

    pub fn record_model_call(&mut self) {
        self.model_calls += 1;
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Round in which an identical call was already dispatched, if any.
    pub fn previous_round(&self, call: &ToolCall) -> Option<u32> {
        self.dispatched.get(&call.fingerprint()).copied()
    }

    /// Remember that `call` is being dispatched in the current round.
    pub fn mark_dispatched(&mut self, call: &ToolCall) {
        self.dispatched
            .entry(call.fingerprint())
            .or_insert(self.iteration + 1);
        if let Some(amount) = call.requested_amount() {
            self.requested_amounts.push(amount);
        }
    }

    /// Append a round's results as tool-result turns and close the round.
    pub fn complete_round(&mut self, results: Vec<ToolResult>) {
        for result in results {
            self.turns.push(Turn::ToolResult { result: result.clone() });
            self.results.push(result);
        }
        self.iteration += 1;
    }

    /// Collect the evidence the output guardrail needs.
    pub fn evidence(&self) -> Evidence {
        let mut evidence = Evidence {
            max_checked_amount: self.requested_amounts.iter().copied().reduce(f64::max),
            ..Evidence::default()
        };
        for result in &self.results {
            match result.payload() {
                Some(ToolPayload::PolicySearch(search)) => {
                    for chunk in &search.results {
                        if !evidence.retrieved.iter().any(|c| c.id == chunk.id) {
                            evidence.retrieved.push(chunk.clone());
                        }
                    }
                }
                Some(ToolPayload::Employee(employee)) => {
                    evidence.employee_level = Some(employee.level.clone());
                }
                Some(ToolPayload::ApprovalCheck(check)) => {
                    evidence.employee_level = Some(check.employee_level.clone());
                    let max = evidence.max_checked_amount.unwrap_or(0.0).max(check.amount);
                    evidence.max_checked_amount = Some(max);
                }
                None => {}
            }
        }
        evidence
    }
}
