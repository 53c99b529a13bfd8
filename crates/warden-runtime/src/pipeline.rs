//! The assembled pipeline.
//!
//! ```text
//!   PolicyRequest ─▶ InputGuardrail ─▶ Orchestrator ─▶ OutputGuardrail ─▶ DecisionReport
//!                         │                 │
//!                         │                 └─▶ ToolRegistry ─▶ RetrievalIndex / corpus
//!                         └─ rejected ─▶ safe decision, model never called
//! ```
//!
//! The index, the tools, and the guardrails are built once and shared by
//! every request. Each call to `handle` owns its own conversation and its
//! own hash-chained trail.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use warden_audit::{DecisionTrail, RequestTrail};
use warden_contracts::{
    config::WardenConfig,
    decision::{PolicyDecision, PolicyRequest, RequestId, Resolution, TrailEntry, TrailRecord},
    error::WardenResult,
    guard::ValidationResult,
    retrieval::ScoredChunk,
};
use warden_core::{
    prompts::compose_query,
    traits::{Embedder, ModelClient, ToolDispatcher, TrailWriter},
    LoopOutcome, Orchestrator,
};
use warden_guard::{InputGuardrail, OutputGuardrail};
use warden_retrieval::{HashingEmbedder, RetrievalIndex};
use warden_tools::ToolRegistry;

use crate::{corpus::Corpus, offline_model::OfflineReasoner};

/// A decision plus everything needed to audit it.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionReport {
    pub request_id: RequestId,
    pub decision: PolicyDecision,
    pub resolution: Resolution,
    /// Sealed trail of the request.
    pub trail: DecisionTrail,
}

/// What `Pipeline::handle` produced.
#[derive(Debug, Clone)]
pub enum RequestOutcome {
    Decided(DecisionReport),
    /// The caller cancelled; no decision is delivered.
    Cancelled,
}

pub struct Pipeline {
    config: WardenConfig,
    input: InputGuardrail,
    index: Arc<RetrievalIndex>,
    tools: Arc<ToolRegistry>,
    orchestrator: Orchestrator,
}

impl Pipeline {
    /// Build the index and tools over `corpus` and wire them to `model`.
    ///
    /// Fails only on startup problems: invalid configuration, an index that
    /// cannot be built, or a tool schema that does not compile.
    pub async fn build(
        config: WardenConfig,
        corpus: Corpus,
        model: Arc<dyn ModelClient>,
        embedder: Arc<dyn Embedder>,
    ) -> WardenResult<Self> {
        config.validate()?;

        let input = InputGuardrail::new(&config.guardrails)?;
        let index = Arc::new(
            RetrievalIndex::build(&corpus.sections, &config.chunking, embedder).await?,
        );
        let tools = Arc::new(ToolRegistry::standard(
            Arc::new(corpus.directory),
            Arc::new(corpus.rules),
            Arc::clone(&index),
            &config,
        )?);
        let finalizer = Arc::new(OutputGuardrail::new(&config.output)?);
        let dispatcher: Arc<dyn ToolDispatcher> = tools.clone();
        let orchestrator =
            Orchestrator::new(model, dispatcher, finalizer, config.orchestration.clone());

        info!(
            chunks = index.len(),
            tools = tools.len(),
            retrieval_threshold = config.retrieval.threshold,
            escalation_threshold = config.output.escalation_threshold,
            "pipeline ready"
        );

        Ok(Self {
            config,
            input,
            index,
            tools,
            orchestrator,
        })
    }

    /// A pipeline that needs no external provider: hashing embeddings and
    /// the rule-based `OfflineReasoner`.
    pub async fn offline(config: WardenConfig, corpus: Corpus) -> WardenResult<Self> {
        let model = Arc::new(OfflineReasoner::new()?);
        let embedder = Arc::new(HashingEmbedder::default());
        Self::build(config, corpus, model, embedder).await
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    /// The dispatcher the model is given, for serving tools directly.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run only the input guardrail.
    pub fn screen(&self, raw: &str) -> ValidationResult {
        self.input.validate(raw)
    }

    /// Query the index with the configured retrieval threshold.
    pub async fn search(&self, query: &str, top_k: usize) -> Vec<ScoredChunk> {
        self.index
            .retrieve(query, top_k, self.config.retrieval.threshold)
            .await
    }

    /// Answer one request.
    pub async fn handle(&self, request: &PolicyRequest, cancel: &CancellationToken) -> RequestOutcome {
        let request_id = RequestId::new();
        if cancel.is_cancelled() {
            info!(request_id = %request_id, "request cancelled before screening");
            return RequestOutcome::Cancelled;
        }

        let trail = RequestTrail::new(request_id.to_string());
        let screened = self.input.validate_request(request);
        record(
            &trail,
            TrailEntry::InputScreened {
                result: screened.clone(),
            },
        );

        let outcome = match screened {
            ValidationResult::Rejected {
                rejection_reason, ..
            } => {
                info!(
                    request_id = %request_id,
                    reason = rejection_reason.as_str(),
                    "request rejected by input guardrail"
                );
                let decision = PolicyDecision::rejected_input(rejection_reason);
                let resolution = Resolution::InputRejected {
                    reason: rejection_reason,
                };
                record(
                    &trail,
                    TrailEntry::Resolved {
                        resolution: resolution.clone(),
                        decision: decision.clone(),
                    },
                );
                if let Err(e) = trail.finalize(trail.request_id()) {
                    warn!(request_id = %request_id, error = %e, "failed to seal decision trail");
                }
                LoopOutcome::Decided {
                    decision,
                    resolution,
                }
            }
            ValidationResult::Valid { sanitized_input } => {
                let query = compose_query(&sanitized_input, request.employee_id.as_deref());
                self.orchestrator
                    .run(&request_id, query, &trail, cancel)
                    .await
            }
        };

        match outcome {
            LoopOutcome::Decided {
                decision,
                resolution,
            } => RequestOutcome::Decided(DecisionReport {
                request_id,
                decision,
                resolution,
                trail: trail.export(),
            }),
            LoopOutcome::Cancelled => RequestOutcome::Cancelled,
        }
    }
}

fn record(trail: &RequestTrail, entry: TrailEntry) {
    if let Err(e) = trail.write(&TrailRecord::new(0, entry)) {
        warn!(request_id = %trail.request_id(), error = %e, "failed to write trail record");
    }
}
