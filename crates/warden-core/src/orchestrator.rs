//! The Warden orchestrator: the tool-augmented reasoning loop.
//!
//! Each request runs an explicit state machine:
//!
//! ```text
//!   AwaitingModel ──tool calls──▶ ExecutingTools ──round done──▶ AwaitingModel
//!        │                                                           │
//!        ├──final answer accepted──▶ TerminalSuccess                  │
//!        └──cap / model failure / second bad answer──▶ TerminalFallback
//! ```
//!
//! Termination is structural: every pass through `AwaitingModel` consumes
//! one model call, and the cap on model calls is checked before each one.
//! A rejected final answer earns exactly one repair round-trip.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use warden_contracts::{
    config::OrchestrationConfig,
    conversation::{ConversationState, ModelTurn, Turn},
    decision::{
        FallbackCause, PolicyDecision, RequestId, Resolution, TrailEntry, TrailRecord,
    },
    tool::{ToolCall, ToolDescriptor, ToolError, ToolOutcome, ToolResult},
};

use crate::{
    prompts::{few_shot_examples, repair_request, SYSTEM_PROMPT},
    traits::{DecisionFinalizer, ModelClient, ToolDispatcher, TrailWriter},
};

/// How a request left the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopOutcome {
    /// A decision for the caller, with the condition that produced it.
    Decided {
        decision: PolicyDecision,
        resolution: Resolution,
    },
    /// The request was cancelled; nothing may be delivered.
    Cancelled,
}

/// States of the reasoning loop.
#[derive(Debug)]
enum LoopState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCall>),
    TerminalSuccess(PolicyDecision),
    TerminalFallback(FallbackCause),
    /// Cancellation observed; the request ends without a decision.
    Cancelled,
}

/// Borrowed per-request context threaded through the loop helpers.
struct RequestScope<'a> {
    request_id: String,
    trail: &'a dyn TrailWriter,
    cancel: &'a CancellationToken,
}

/// Drives requests through the reasoning loop.
///
/// One orchestrator serves every request; all per-request state lives in
/// the `ConversationState` created inside `run()`.
pub struct Orchestrator {
    model: Arc<dyn ModelClient>,
    tools: Arc<dyn ToolDispatcher>,
    finalizer: Arc<dyn DecisionFinalizer>,
    limits: OrchestrationConfig,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ModelClient>,
        tools: Arc<dyn ToolDispatcher>,
        finalizer: Arc<dyn DecisionFinalizer>,
        limits: OrchestrationConfig,
    ) -> Self {
        Self { model, tools, finalizer, limits }
    }

    /// Answer one sanitized query.
    ///
    /// `query` must already have passed the input guardrail. The loop never
    /// returns an error: model and tool failures resolve to the fallback
    /// decision, and cancellation resolves to `LoopOutcome::Cancelled`.
    pub async fn run(
        &self,
        request_id: &RequestId,
        query: String,
        trail: &dyn TrailWriter,
        cancel: &CancellationToken,
    ) -> LoopOutcome {
        let scope = RequestScope {
            request_id: request_id.to_string(),
            trail,
            cancel,
        };
        let descriptors = self.tools.descriptors();
        let mut conversation =
            ConversationState::seeded(SYSTEM_PROMPT, few_shot_examples(), query);
        let mut repair_used = false;
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if cancel.is_cancelled() {
                        LoopState::Cancelled
                    } else if conversation.model_calls() >= self.limits.max_iterations {
                        warn!(
                            request_id = %scope.request_id,
                            model_calls = conversation.model_calls(),
                            cap = self.limits.max_iterations,
                            "iteration cap reached without an accepted answer"
                        );
                        LoopState::TerminalFallback(FallbackCause::IterationCap)
                    } else {
                        self.await_model(&mut conversation, &descriptors, &mut repair_used, &scope)
                            .await
                    }
                }

                LoopState::ExecutingTools(calls) => {
                    if cancel.is_cancelled() {
                        LoopState::Cancelled
                    } else {
                        self.execute_tools(calls, &mut conversation, &scope).await;
                        LoopState::AwaitingModel
                    }
                }

                LoopState::TerminalSuccess(decision) => {
                    info!(
                        request_id = %scope.request_id,
                        approved = decision.approved,
                        confidence = decision.confidence,
                        requires_human_review = decision.requires_human_review,
                        rounds = conversation.iteration(),
                        "request answered"
                    );
                    return self.resolve(decision, Resolution::Answered, &conversation, &scope);
                }

                LoopState::TerminalFallback(cause) => {
                    if cancel.is_cancelled() {
                        LoopState::Cancelled
                    } else {
                        let mut decision = PolicyDecision::fallback(fallback_reason(cause));
                        decision.employee_level = conversation.evidence().employee_level;
                        info!(
                            request_id = %scope.request_id,
                            cause = cause.as_str(),
                            "request resolved to fallback decision"
                        );
                        return self.resolve(
                            decision,
                            Resolution::Fallback { cause },
                            &conversation,
                            &scope,
                        );
                    }
                }

                LoopState::Cancelled => {
                    info!(
                        request_id = %scope.request_id,
                        rounds = conversation.iteration(),
                        "request cancelled; no decision delivered"
                    );
                    return LoopOutcome::Cancelled;
                }
            };
        }
    }

    /// `AwaitingModel`: one model round-trip and the transition it implies.
    async fn await_model(
        &self,
        conversation: &mut ConversationState,
        descriptors: &[ToolDescriptor],
        repair_used: &mut bool,
        scope: &RequestScope<'_>,
    ) -> LoopState {
        conversation.record_model_call();
        debug!(
            request_id = %scope.request_id,
            model_call = conversation.model_calls(),
            turns = conversation.turns().len(),
            "invoking model"
        );

        let timeout = Duration::from_millis(self.limits.model_timeout_ms);
        let response = tokio::select! {
            biased;
            _ = scope.cancel.cancelled() => return LoopState::Cancelled,
            r = tokio::time::timeout(timeout, self.model.next_turn(conversation.turns(), descriptors)) => r,
        };

        let turn = match response {
            Ok(Ok(turn)) => turn,
            Ok(Err(e)) => {
                warn!(request_id = %scope.request_id, error = %e, "model call failed");
                self.record(scope, conversation, TrailEntry::ModelFailed { reason: e.to_string() });
                return LoopState::TerminalFallback(FallbackCause::ModelUnavailable);
            }
            Err(_) => {
                let reason = format!("model did not respond within {} ms", timeout.as_millis());
                warn!(request_id = %scope.request_id, %reason, "model call timed out");
                self.record(scope, conversation, TrailEntry::ModelFailed { reason });
                return LoopState::TerminalFallback(FallbackCause::ModelUnavailable);
            }
        };

        self.record(scope, conversation, TrailEntry::ModelResponded { turn: turn.clone() });

        match turn {
            ModelTurn::ToolCalls { text, calls } if !calls.is_empty() => {
                conversation.push(Turn::Assistant {
                    content: text,
                    tool_calls: calls.clone(),
                });
                LoopState::ExecutingTools(calls)
            }
            // A tool request with no calls is treated as an (empty) answer so
            // that it goes through validation and the repair path.
            ModelTurn::ToolCalls { text, .. } => {
                self.accept_answer(text.unwrap_or_default(), conversation, repair_used, scope)
            }
            ModelTurn::Final { text } => {
                self.accept_answer(text, conversation, repair_used, scope)
            }
        }
    }

    /// Hand a final answer to the finalizer; allow one repair round-trip.
    fn accept_answer(
        &self,
        text: String,
        conversation: &mut ConversationState,
        repair_used: &mut bool,
        scope: &RequestScope<'_>,
    ) -> LoopState {
        let evidence = conversation.evidence();
        let verdict = self.finalizer.finalize(&text, &evidence);
        conversation.push(Turn::assistant(text));

        match verdict {
            Ok(decision) => LoopState::TerminalSuccess(decision),
            Err(e) => {
                let reason = e.to_string();
                warn!(
                    request_id = %scope.request_id,
                    %reason,
                    repair_used = *repair_used,
                    "final answer rejected"
                );
                self.record(scope, conversation, TrailEntry::AnswerRejected { reason: reason.clone() });

                if *repair_used {
                    LoopState::TerminalFallback(FallbackCause::SchemaViolation)
                } else {
                    *repair_used = true;
                    conversation.push(Turn::user(repair_request(&reason)));
                    LoopState::AwaitingModel
                }
            }
        }
    }

    /// `ExecutingTools`: dispatch one round of calls concurrently.
    ///
    /// Results are appended in the order the model requested them, whatever
    /// order they finish in. Calls identical to an earlier one in this
    /// request are answered with `DuplicateCall` instead of being re-run.
    async fn execute_tools(
        &self,
        calls: Vec<ToolCall>,
        conversation: &mut ConversationState,
        scope: &RequestScope<'_>,
    ) {
        let plan: Vec<Option<u32>> = calls
            .iter()
            .map(|call| {
                let previous = conversation.previous_round(call);
                if previous.is_none() {
                    conversation.mark_dispatched(call);
                }
                previous
            })
            .collect();

        debug!(
            request_id = %scope.request_id,
            round = conversation.iteration() + 1,
            calls = calls.len(),
            "executing tool round"
        );

        let tools = &self.tools;
        let dispatches = calls.iter().zip(plan).map(|(call, previous)| async move {
            match previous {
                Some(round) => ToolResult::new(
                    call,
                    ToolOutcome::Error(ToolError::DuplicateCall { round }),
                ),
                None => tools.dispatch(call).await,
            }
        });
        let results = join_all(dispatches).await;

        for (call, result) in calls.iter().zip(&results) {
            if let Some(error) = result.error() {
                warn!(
                    request_id = %scope.request_id,
                    tool = %call.name,
                    code = error.code(),
                    error = %error,
                    "tool call failed"
                );
            }
            self.record(
                scope,
                conversation,
                TrailEntry::ToolDispatched {
                    call: call.clone(),
                    result: result.clone(),
                },
            );
        }

        conversation.complete_round(results);
    }

    /// Write the terminal record, seal the trail, and build the outcome.
    fn resolve(
        &self,
        decision: PolicyDecision,
        resolution: Resolution,
        conversation: &ConversationState,
        scope: &RequestScope<'_>,
    ) -> LoopOutcome {
        self.record(
            scope,
            conversation,
            TrailEntry::Resolved {
                resolution: resolution.clone(),
                decision: decision.clone(),
            },
        );
        if let Err(e) = scope.trail.finalize(&scope.request_id) {
            warn!(request_id = %scope.request_id, error = %e, "failed to seal decision trail");
        }
        LoopOutcome::Decided { decision, resolution }
    }

    /// Append to the trail. A trail failure is logged but never changes the
    /// decision a caller receives.
    fn record(&self, scope: &RequestScope<'_>, conversation: &ConversationState, entry: TrailEntry) {
        let record = TrailRecord::new(conversation.iteration(), entry);
        if let Err(e) = scope.trail.write(&record) {
            warn!(request_id = %scope.request_id, error = %e, "failed to write trail record");
        }
    }
}

fn fallback_reason(cause: FallbackCause) -> &'static str {
    match cause {
        FallbackCause::IterationCap => {
            "Unable to reach a decision within the allowed number of reasoning steps. \
             Escalated for human review."
        }
        FallbackCause::ModelUnavailable => {
            "The reasoning service is unavailable. Escalated for human review."
        }
        FallbackCause::SchemaViolation => {
            "The answer could not be validated as a policy decision. Escalated for human review."
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
