//! Output guardrail: turns the model's final answer into a `PolicyDecision`
//! a caller may rely on.
//!
//! Validation runs in two phases:
//!
//! 1. **Structural**: the JSON object is pulled out of the answer (a
//!    ```` ```json ```` fence, else the outermost braces), checked against
//!    the decision schema with `jsonschema`, then deserialized. Any failure
//!    is a `SchemaViolation`, which the orchestrator answers with one repair
//!    request.
//! 2. **Semantic**: the decision is checked against the evidence gathered
//!    during the request and adjusted, never rejected:
//!    - nothing retrieved → insufficient information, not approved
//!    - cited policy not retrieved → not approved, confidence 0
//!    - confidence below the escalation threshold → human review
//!    - a checked amount above the high-value limit → human review
//!    - PII in the reason is redacted

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use warden_contracts::{
    config::OutputConfig,
    conversation::Evidence,
    decision::PolicyDecision,
    error::{WardenError, WardenResult},
};
use warden_core::traits::DecisionFinalizer;

use crate::pii::PiiScreen;

/// Prefix every no-evidence decision's reason starts with.
pub const INSUFFICIENT_INFORMATION: &str = "Insufficient information";

/// The JSON Schema a final answer must satisfy.
///
/// `policy_reference` and `requires_escalation` are accepted as spellings of
/// `policy_ref` and `requires_human_review`.
pub fn decision_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "approved": { "type": "boolean" },
            "reason": { "type": "string", "minLength": 10 },
            "policy_ref": { "type": "string" },
            "policy_reference": { "type": "string" },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
            "requires_human_review": { "type": "boolean" },
            "requires_escalation": { "type": "boolean" },
            "escalation_reason": { "type": ["string", "null"] },
            "employee_level": { "type": ["string", "null"] }
        },
        "required": ["approved", "reason", "confidence"],
        "anyOf": [
            { "required": ["policy_ref"] },
            { "required": ["policy_reference"] }
        ],
        "additionalProperties": false
    })
}

/// The answer as the model wrote it, before any routing.
#[derive(Debug, Deserialize)]
struct CandidateDecision {
    approved: bool,
    reason: String,
    #[serde(alias = "policy_reference")]
    policy_ref: String,
    confidence: f64,
    #[serde(default, alias = "requires_escalation")]
    requires_human_review: bool,
    #[serde(default)]
    escalation_reason: Option<String>,
    #[serde(default)]
    employee_level: Option<String>,
}

pub struct OutputGuardrail {
    validator: jsonschema::Validator,
    config: OutputConfig,
    pii: PiiScreen,
}

impl OutputGuardrail {
    pub fn new(config: &OutputConfig) -> WardenResult<Self> {
        let validator =
            jsonschema::validator_for(&decision_schema()).map_err(|e| WardenError::ConfigError {
                reason: format!("invalid decision schema: {}", e),
            })?;
        Ok(Self {
            validator,
            config: config.clone(),
            pii: PiiScreen::new(&config.internal_email_domain)?,
        })
    }

    /// Phase 1: extract, validate, and deserialize.
    fn parse(&self, raw_answer: &str) -> WardenResult<CandidateDecision> {
        let value = extract_json(raw_answer).ok_or_else(|| WardenError::SchemaViolation {
            reason: "the answer does not contain a JSON object".to_string(),
        })?;

        let violations: Vec<String> = self
            .validator
            .iter_errors(&value)
            .map(|error| format!("at '{}': {}", error.instance_path, error))
            .collect();
        if !violations.is_empty() {
            return Err(WardenError::SchemaViolation {
                reason: violations.join("; "),
            });
        }

        serde_json::from_value(value).map_err(|e| WardenError::SchemaViolation {
            reason: e.to_string(),
        })
    }

    /// Phase 2: route the candidate against the evidence.
    fn route(&self, candidate: CandidateDecision, evidence: &Evidence) -> PolicyDecision {
        let CandidateDecision {
            mut approved,
            mut reason,
            mut policy_ref,
            mut confidence,
            mut requires_human_review,
            escalation_reason,
            employee_level,
        } = candidate;
        let mut notices: Vec<String> = vec![];

        if requires_human_review {
            if let Some(why) = escalation_reason.filter(|s| !s.trim().is_empty()) {
                notices.push(format!("Escalation requested: {}.", why.trim().trim_end_matches('.')));
            }
        }

        if evidence.retrieved.is_empty() {
            warn!(policy_ref = %policy_ref, "no policy evidence retrieved; refusing to decide");
            approved = false;
            confidence = 0.0;
            requires_human_review = true;
            policy_ref = PolicyDecision::NO_POLICY.to_string();
            if !reason
                .to_ascii_lowercase()
                .starts_with(&INSUFFICIENT_INFORMATION.to_ascii_lowercase())
            {
                reason = format!("{}: {}", INSUFFICIENT_INFORMATION, reason);
            }
        } else if evidence.cites(&policy_ref).is_none() {
            warn!(
                policy_ref = %policy_ref,
                retrieved = evidence.retrieved.len(),
                "citation mismatch: cited policy was not retrieved"
            );
            approved = false;
            confidence = 0.0;
            requires_human_review = true;
            notices.push(format!(
                "Cited policy '{}' is not among the retrieved policy sections.",
                policy_ref
            ));
        }

        if confidence < self.config.escalation_threshold {
            requires_human_review = true;
            notices.push(format!(
                "Escalated for human review: confidence {:.2} is below the {:.2} threshold.",
                confidence, self.config.escalation_threshold
            ));
        }

        if let Some(amount) = evidence.max_checked_amount {
            if amount > self.config.high_value_review_amount {
                requires_human_review = true;
                notices.push(format!(
                    "High-value expense (${:.2}) requires human review.",
                    amount
                ));
            }
        }

        if !notices.is_empty() {
            reason = format!("{} {}", reason.trim_end(), notices.join(" "));
        }

        let pii = self.pii.detect(&reason);
        if !pii.is_empty() {
            let kinds: Vec<String> = pii.iter().map(ToString::to_string).collect();
            warn!(kinds = %kinds.join(","), "redacting PII from decision reason");
            reason = self.pii.redact(&reason);
        }

        PolicyDecision {
            approved,
            reason,
            policy_ref,
            confidence,
            requires_human_review,
            employee_level: employee_level
                .filter(|l| !l.trim().is_empty())
                .or_else(|| evidence.employee_level.clone()),
        }
    }
}

impl DecisionFinalizer for OutputGuardrail {
    fn finalize(&self, raw_answer: &str, evidence: &Evidence) -> WardenResult<PolicyDecision> {
        let candidate = self.parse(raw_answer)?;
        let decision = self.route(candidate, evidence);
        debug!(
            approved = decision.approved,
            confidence = decision.confidence,
            requires_human_review = decision.requires_human_review,
            policy_ref = %decision.policy_ref,
            "final answer accepted"
        );
        Ok(decision)
    }
}

/// Pull the JSON object out of a model answer: the first ```` ```json ````
/// fence that parses, otherwise the span from the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<Value> {
    if let Some(start) = text.find("```json") {
        let body = &text[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            if let Ok(value) = serde_json::from_str::<Value>(body[..end].trim()) {
                return Some(value);
            }
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&text[start..=end])
        .ok()
        .filter(Value::is_object)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use warden_contracts::{
        config::OutputConfig, conversation::Evidence, error::WardenError, retrieval::ScoredChunk,
    };
    use warden_core::traits::DecisionFinalizer;

    use super::{extract_json, OutputGuardrail};

    // ── Builder helpers ───────────────────────────────────────────────────────

    fn guard() -> OutputGuardrail {
        OutputGuardrail::new(&OutputConfig::default()).unwrap()
    }

    fn chunk(id: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            id: id.to_string(),
            section_ref: id.split('#').next().unwrap_or(id).to_string(),
            title: "Policy".to_string(),
            text: "Policy text".to_string(),
            score,
        }
    }

    fn evidence(ids: &[&str]) -> Evidence {
        Evidence {
            retrieved: ids.iter().map(|id| chunk(id, 0.9)).collect(),
            employee_level: Some("Associate".to_string()),
            max_checked_amount: None,
        }
    }

    fn answer(approved: bool, policy_ref: &str, confidence: f64) -> String {
        json!({
            "approved": approved,
            "reason": "Meals are covered up to $50 per person.",
            "policy_ref": policy_ref,
            "confidence": confidence,
            "requires_human_review": false
        })
        .to_string()
    }

    // ── Structural phase ──────────────────────────────────────────────────────

    #[test]
    fn cited_confident_answer_passes_unchanged() {
        let decision = guard()
            .finalize(&answer(true, "expense-001", 0.9), &evidence(&["expense-001"]))
            .unwrap();
        assert!(decision.approved);
        assert!(!decision.requires_human_review);
        assert_eq!(decision.confidence, 0.9);
        assert_eq!(decision.reason, "Meals are covered up to $50 per person.");
        assert_eq!(decision.employee_level.as_deref(), Some("Associate"));
    }

    #[test]
    fn fenced_answer_with_aliases_is_accepted() {
        let raw = "Here is my decision:\n```json\n{\"approved\": true, \"reason\": \"Business class is allowed on long flights.\", \"policy_reference\": \"travel-002\", \"confidence\": 0.95, \"requires_escalation\": false}\n```";
        let decision = guard().finalize(raw, &evidence(&["travel-002"])).unwrap();
        assert_eq!(decision.policy_ref, "travel-002");
        assert!(decision.approved);
    }

    #[test]
    fn prose_without_json_is_a_schema_violation() {
        let err = guard().finalize("Yes, that is fine.", &evidence(&["x"])).unwrap_err();
        assert!(matches!(err, WardenError::SchemaViolation { .. }));
    }

    #[test]
    fn schema_rejects_bad_types_ranges_and_extra_fields() {
        let g = guard();
        let e = evidence(&["expense-001"]);
        for bad in [
            json!({ "approved": "yes", "reason": "Because policy says so.", "policy_ref": "expense-001", "confidence": 0.9 }),
            json!({ "approved": true, "reason": "Because policy says so.", "policy_ref": "expense-001", "confidence": 1.5 }),
            json!({ "approved": true, "reason": "Because policy says so.", "confidence": 0.9 }),
            json!({ "approved": true, "reason": "short", "policy_ref": "expense-001", "confidence": 0.9 }),
            json!({ "approved": true, "reason": "Because policy says so.", "policy_ref": "expense-001", "confidence": 0.9, "bonus": 1 }),
        ] {
            let err = g.finalize(&bad.to_string(), &e).unwrap_err();
            assert!(matches!(err, WardenError::SchemaViolation { .. }), "{}", bad);
        }
    }

    #[test]
    fn extract_prefers_fence_then_braces() {
        assert_eq!(extract_json("noise {\"a\": 1} trailing"), Some(json!({ "a": 1 })));
        assert_eq!(extract_json("```json\n{\"b\": 2}\n``` and {\"c\": 3}"), Some(json!({ "b": 2 })));
        assert_eq!(extract_json("} backwards {"), None);
    }

    // ── Semantic phase ────────────────────────────────────────────────────────

    #[test]
    fn low_confidence_routes_to_review() {
        let decision = guard()
            .finalize(&answer(true, "expense-001", 0.45), &evidence(&["expense-001"]))
            .unwrap();
        assert!(decision.requires_human_review);
        assert!(decision.reason.contains("Escalated for human review"));
    }

    #[test]
    fn confidence_invariant_holds_for_a_sweep() {
        let g = guard();
        for step in 0..=20 {
            let confidence = step as f64 / 20.0;
            let decision = g
                .finalize(&answer(true, "expense-001", confidence), &evidence(&["expense-001"]))
                .unwrap();
            if decision.confidence < 0.7 {
                assert!(decision.requires_human_review, "confidence {}", confidence);
            }
        }
    }

    #[test]
    fn uncited_approval_is_revoked() {
        let decision = guard()
            .finalize(&answer(true, "travel-009", 0.95), &evidence(&["expense-001"]))
            .unwrap();
        assert!(!decision.approved);
        assert_eq!(decision.confidence, 0.0);
        assert!(decision.requires_human_review);
        assert!(decision.reason.contains("travel-009"));
    }

    #[test]
    fn citing_a_section_of_a_windowed_chunk_counts() {
        let decision = guard()
            .finalize(&answer(true, "travel-002", 0.9), &evidence(&["travel-002#2"]))
            .unwrap();
        assert!(decision.approved);
    }

    #[test]
    fn nothing_retrieved_means_insufficient_information() {
        let decision = guard()
            .finalize(&answer(true, "expense-001", 0.9), &Evidence::default())
            .unwrap();
        assert!(!decision.approved);
        assert_eq!(decision.confidence, 0.0);
        assert!(decision.requires_human_review);
        assert!(decision.reason.starts_with("Insufficient information"));
        assert_eq!(decision.policy_ref, "N/A");
    }

    #[test]
    fn high_value_amount_forces_review() {
        let mut e = evidence(&["expense-001"]);
        e.max_checked_amount = Some(12_000.0);
        let decision = guard().finalize(&answer(true, "expense-001", 0.95), &e).unwrap();
        assert!(decision.approved);
        assert!(decision.requires_human_review);
        assert!(decision.reason.contains("$12000.00"));
    }

    #[test]
    fn pii_in_reason_is_redacted() {
        let raw = json!({
            "approved": false,
            "reason": "Card 4111 1111 1111 1111 belongs to SSN 123-45-6789; ask bob@gmail.com.",
            "policy_ref": "expense-001",
            "confidence": 0.9
        })
        .to_string();
        let decision = guard().finalize(&raw, &evidence(&["expense-001"])).unwrap();
        assert!(!decision.reason.contains("4111"));
        assert!(!decision.reason.contains("6789"));
        assert!(!decision.reason.contains("bob@gmail.com"));
        assert!(decision.reason.contains("[CARD REDACTED]"));
    }

    #[test]
    fn model_supplied_level_wins_over_evidence() {
        let raw = json!({
            "approved": true,
            "reason": "Meals are covered up to $50 per person.",
            "policy_ref": "expense-001",
            "confidence": 0.9,
            "employee_level": "Manager"
        })
        .to_string();
        let decision = guard().finalize(&raw, &evidence(&["expense-001"])).unwrap();
        assert_eq!(decision.employee_level.as_deref(), Some("Manager"));
    }
}
