//! A deterministic, rule-based `ModelClient`.
//!
//! `OfflineReasoner` lets the pipeline run end to end without a language
//! model provider. It follows the same protocol a hosted model would:
//!
//! 1. First turn: call `policy_search` with the question, plus
//!    `employee_lookup` when an employee id is given, plus
//!    `approval_threshold_check` when the question also names a dollar
//!    amount and a recognizable expense type.
//! 2. Second turn: answer with a JSON decision built from the tool results.
//!
//! It never approves without a successful threshold check, and it reports
//! low confidence when it can only quote the policy.

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;

use warden_contracts::{
    conversation::{ModelTurn, Turn},
    decision::PolicyDecision,
    error::{WardenError, WardenResult},
    tool::{
        ApprovalCheck, SearchResults, ToolCall, ToolDescriptor, ToolPayload,
        APPROVAL_THRESHOLD_CHECK, EMPLOYEE_LOOKUP, POLICY_SEARCH,
    },
};
use warden_core::{prompts::few_shot_examples, traits::ModelClient};

const EMPLOYEE_LINE: &str = "Employee ID: ";

/// Keyword → expense type, first match wins.
const EXPENSE_KEYWORDS: &[(&str, &[&str])] = &[
    ("client_entertainment", &["client entertainment", "entertain"]),
    ("meal", &["lunch", "dinner", "breakfast", "meal", "coffee", "food"]),
    ("travel", &["flight", "airfare", "hotel", "train", "taxi", "travel", "uber"]),
    ("equipment", &["laptop", "monitor", "keyboard", "equipment", "chair"]),
    ("software", &["software", "subscription", "license", "saas"]),
];

pub struct OfflineReasoner {
    amount: Regex,
    seeded_turns: usize,
}

impl OfflineReasoner {
    pub fn new() -> WardenResult<Self> {
        let amount = Regex::new(r"\$\s?([0-9][0-9,]*(?:\.[0-9]{1,2})?)").map_err(|e| {
            WardenError::ConfigError {
                reason: format!("invalid amount pattern: {}", e),
            }
        })?;
        Ok(Self {
            amount,
            // system prompt + worked example
            seeded_turns: 1 + few_shot_examples().len(),
        })
    }

    fn plan(&self, question: &Question) -> Vec<ToolCall> {
        let mut calls = vec![ToolCall::new(
            "offline-search",
            POLICY_SEARCH,
            json!({ "query": question.text.chars().take(500).collect::<String>(), "max_results": 3 }),
        )];

        if let Some(employee_id) = &question.employee_id {
            calls.push(ToolCall::new(
                "offline-lookup",
                EMPLOYEE_LOOKUP,
                json!({ "employee_id": employee_id }),
            ));
            if let (Some(amount), Some(expense_type)) = (self.amount_in(&question.text), expense_type(&question.text)) {
                calls.push(ToolCall::new(
                    "offline-threshold",
                    APPROVAL_THRESHOLD_CHECK,
                    json!({
                        "employee_id": employee_id,
                        "amount": amount,
                        "expense_type": expense_type
                    }),
                ));
            }
        }
        calls
    }

    fn amount_in(&self, text: &str) -> Option<f64> {
        let captures = self.amount.captures(text)?;
        captures[1].replace(',', "").parse::<f64>().ok().filter(|a| *a > 0.0)
    }
}

#[async_trait]
impl ModelClient for OfflineReasoner {
    async fn next_turn(&self, turns: &[Turn], _tools: &[ToolDescriptor]) -> WardenResult<ModelTurn> {
        let live = turns.get(self.seeded_turns..).unwrap_or_default();
        let question = match live.first() {
            Some(Turn::User { content }) => Question::parse(content),
            _ => {
                return Err(WardenError::ModelUnavailable {
                    reason: "conversation does not contain a question".to_string(),
                })
            }
        };

        let mut search = None;
        let mut check = None;
        let mut level = None;
        let mut dispatched = false;
        for turn in live {
            if let Turn::ToolResult { result } = turn {
                dispatched = true;
                match result.payload() {
                    Some(ToolPayload::PolicySearch(s)) => search = Some(s.clone()),
                    Some(ToolPayload::ApprovalCheck(c)) => check = Some(c.clone()),
                    Some(ToolPayload::Employee(e)) => level = Some(e.level.clone()),
                    None => {}
                }
            }
        }

        if !dispatched {
            return Ok(ModelTurn::ToolCalls {
                text: Some("Looking up the relevant policy.".to_string()),
                calls: self.plan(&question),
            });
        }

        Ok(ModelTurn::Final {
            text: decide(search.as_ref(), check.as_ref(), level).to_string(),
        })
    }
}

struct Question {
    text: String,
    employee_id: Option<String>,
}

impl Question {
    fn parse(content: &str) -> Self {
        match content.strip_prefix(EMPLOYEE_LINE).and_then(|rest| rest.split_once('\n')) {
            Some((id, text)) => Self {
                text: text.trim().to_string(),
                employee_id: Some(id.trim().to_string()),
            },
            None => Self {
                text: content.trim().to_string(),
                employee_id: None,
            },
        }
    }
}

fn expense_type(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    EXPENSE_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(kind, _)| *kind)
}

fn decide(
    search: Option<&SearchResults>,
    check: Option<&ApprovalCheck>,
    level: Option<String>,
) -> serde_json::Value {
    let Some(top) = search.and_then(|s| s.results.first()) else {
        return json!({
            "approved": false,
            "reason": "Insufficient information: no policy section addresses this question.",
            "policy_ref": PolicyDecision::NO_POLICY,
            "confidence": 0.0,
            "requires_human_review": true,
            "employee_level": level
        });
    };

    match check {
        Some(check) => {
            let approved = !check.requires_approval;
            let reason = if approved {
                format!(
                    "The {} expense of ${:.2} is within the ${:.2} limit for {} level ({}).",
                    check.expense_type,
                    check.amount,
                    check.threshold_amount,
                    check.employee_level,
                    top.title
                )
            } else {
                format!(
                    "The {} expense of ${:.2} exceeds the ${:.2} limit for {} level and needs {} approval ({}).",
                    check.expense_type,
                    check.amount,
                    check.threshold_amount,
                    check.employee_level,
                    check.required_approver_level.as_deref().unwrap_or("manager"),
                    top.title
                )
            };
            json!({
                "approved": approved,
                "reason": reason,
                "policy_ref": top.id,
                "confidence": 0.85,
                "requires_human_review": !approved,
                "employee_level": check.employee_level
            })
        }
        None => json!({
            "approved": false,
            "reason": format!(
                "The closest policy is '{}', but no spend threshold could be checked for this request.",
                top.title
            ),
            "policy_ref": top.id,
            "confidence": 0.5,
            "requires_human_review": true,
            "employee_level": level
        }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use warden_contracts::{
        conversation::{ModelTurn, Turn},
        retrieval::ScoredChunk,
        tool::{SearchResults, ToolCall, ToolOutcome, ToolPayload, ToolResult},
    };
    use warden_core::{
        prompts::{compose_query, few_shot_examples, SYSTEM_PROMPT},
        traits::ModelClient,
    };

    use super::OfflineReasoner;

    fn seeded(query: &str) -> Vec<Turn> {
        let mut turns = vec![Turn::system(SYSTEM_PROMPT)];
        turns.extend(few_shot_examples());
        turns.push(Turn::user(query));
        turns
    }

    #[tokio::test]
    async fn first_turn_plans_all_three_tools() {
        let model = OfflineReasoner::new().unwrap();
        let turns = seeded(&compose_query("Can I expense a $1,040.50 team dinner?", Some("emp001")));
        match model.next_turn(&turns, &[]).await.unwrap() {
            ModelTurn::ToolCalls { calls, .. } => {
                let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
                assert_eq!(names, vec!["policy_search", "employee_lookup", "approval_threshold_check"]);
                assert_eq!(calls[2].arguments["amount"], 1040.5);
                assert_eq!(calls[2].arguments["expense_type"], "meal");
            }
            other => panic!("expected tool calls, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn anonymous_question_only_searches() {
        let model = OfflineReasoner::new().unwrap();
        match model.next_turn(&seeded("What is the hotel limit?"), &[]).await.unwrap() {
            ModelTurn::ToolCalls { calls, .. } => assert_eq!(calls.len(), 1),
            other => panic!("expected tool calls, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_search_yields_insufficient_information() {
        let model = OfflineReasoner::new().unwrap();
        let mut turns = seeded("Is pet insurance covered?");
        let call = ToolCall::new("offline-search", "policy_search", serde_json::json!({ "query": "x" }));
        turns.push(Turn::ToolResult {
            result: ToolResult::new(
                &call,
                ToolOutcome::Payload(ToolPayload::PolicySearch(SearchResults {
                    query: "x".to_string(),
                    threshold: 0.7,
                    insufficient_information: true,
                    results: vec![],
                })),
            ),
        });

        match model.next_turn(&turns, &[]).await.unwrap() {
            ModelTurn::Final { text } => {
                let v: Value = serde_json::from_str(&text).unwrap();
                assert_eq!(v["approved"], false);
                assert_eq!(v["confidence"], 0.0);
                assert!(v["reason"].as_str().unwrap().starts_with("Insufficient information"));
            }
            other => panic!("expected final answer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn search_without_check_does_not_approve() {
        let model = OfflineReasoner::new().unwrap();
        let mut turns = seeded("What is the hotel limit?");
        let call = ToolCall::new("offline-search", "policy_search", serde_json::json!({ "query": "x" }));
        turns.push(Turn::ToolResult {
            result: ToolResult::new(
                &call,
                ToolOutcome::Payload(ToolPayload::PolicySearch(SearchResults {
                    query: "x".to_string(),
                    threshold: 0.1,
                    insufficient_information: false,
                    results: vec![ScoredChunk {
                        id: "travel-003".to_string(),
                        section_ref: "travel-003".to_string(),
                        title: "Hotel Accommodation".to_string(),
                        text: "Hotel stays...".to_string(),
                        score: 0.4,
                    }],
                })),
            ),
        });

        match model.next_turn(&turns, &[]).await.unwrap() {
            ModelTurn::Final { text } => {
                let v: Value = serde_json::from_str(&text).unwrap();
                assert_eq!(v["approved"], false);
                assert_eq!(v["policy_ref"], "travel-003");
            }
            other => panic!("expected final answer, got {:?}", other),
        }
    }
}
