//! Tool registry and dispatcher.
//!
//! Dispatch order for one call:
//!
//! 1. Unknown name → `unknown_tool`.
//! 2. Arguments checked against the tool's compiled JSON Schema; every
//!    violation is collected into one `invalid_arguments` message.
//! 3. The tool runs under the registry timeout; expiry → `tool_unavailable`.
//!
//! The registry never returns an error to the loop. It always hands back a
//! `ToolResult` carrying either a payload or a typed `ToolError`.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use warden_contracts::{
    config::WardenConfig,
    error::{WardenError, WardenResult},
    tool::{ToolCall, ToolDescriptor, ToolError, ToolPayload, ToolResult},
};
use warden_core::traits::ToolDispatcher;
use warden_retrieval::RetrievalIndex;

use crate::{
    approval::ApprovalRules,
    builtin::{ApprovalThresholdCheck, EmployeeLookup, PolicySearch},
    directory::EmployeeDirectory,
};

/// One callable tool.
///
/// `execute` receives arguments that already satisfy
/// `descriptor().input_schema`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    async fn execute(&self, arguments: Value) -> Result<ToolPayload, ToolError>;
}

struct RegisteredTool {
    tool: Arc<dyn Tool>,
    descriptor: ToolDescriptor,
    validator: jsonschema::Validator,
}

pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
    timeout: Duration,
}

impl ToolRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            tools: BTreeMap::new(),
            timeout,
        }
    }

    /// The three built-in tools over the given reference data.
    pub fn standard(
        directory: Arc<EmployeeDirectory>,
        rules: Arc<ApprovalRules>,
        index: Arc<RetrievalIndex>,
        config: &WardenConfig,
    ) -> WardenResult<Self> {
        let mut registry =
            Self::new(Duration::from_millis(config.orchestration.tool_timeout_ms));
        registry.register(EmployeeLookup::new(Arc::clone(&directory)))?;
        registry.register(PolicySearch::new(index, config.retrieval.threshold))?;
        registry.register(ApprovalThresholdCheck::new(directory, rules))?;
        Ok(registry)
    }

    /// Add `tool`, compiling its input schema. Registering a name twice
    /// replaces the earlier tool.
    pub fn register<T>(&mut self, tool: T) -> WardenResult<()>
    where
        T: Tool + 'static,
    {
        let descriptor = tool.descriptor();
        let validator = jsonschema::validator_for(&descriptor.input_schema).map_err(|e| {
            WardenError::ToolSchemaError {
                tool: descriptor.name.clone(),
                reason: e.to_string(),
            }
        })?;
        self.tools.insert(
            descriptor.name.clone(),
            RegisteredTool {
                tool: Arc::new(tool),
                descriptor,
                validator,
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    async fn run(&self, call: &ToolCall) -> Result<ToolPayload, ToolError> {
        let entry = self.tools.get(&call.name).ok_or_else(|| ToolError::UnknownTool {
            name: call.name.clone(),
        })?;

        let violations: Vec<String> = entry
            .validator
            .iter_errors(&call.arguments)
            .map(|error| {
                let path = error.instance_path.to_string();
                if path.is_empty() {
                    error.to_string()
                } else {
                    format!("{}: {}", path, error)
                }
            })
            .collect();
        if !violations.is_empty() {
            return Err(ToolError::InvalidArguments {
                message: violations.join("; "),
            });
        }

        tokio::time::timeout(self.timeout, entry.tool.execute(call.arguments.clone()))
            .await
            .map_err(|_| ToolError::ToolUnavailable {
                message: format!(
                    "'{}' did not finish within {} ms",
                    call.name,
                    self.timeout.as_millis()
                ),
            })?
    }
}

#[async_trait]
impl ToolDispatcher for ToolRegistry {
    fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor.clone()).collect()
    }

    async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        debug!(tool = %call.name, call_id = %call.id, "dispatching tool call");
        let result = self.run(call).await;
        if let Err(error) = &result {
            warn!(tool = %call.name, call_id = %call.id, code = error.code(), %error, "tool call failed");
        }
        ToolResult::new(call, result)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, sync::Arc, time::Duration};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use warden_contracts::{
        config::{ChunkingConfig, WardenConfig},
        corpus::{ApprovalRule, Employee, PolicySection},
        error::WardenError,
        tool::{ToolCall, ToolDescriptor, ToolError, ToolPayload},
    };
    use warden_core::traits::{Embedder, ToolDispatcher};
    use warden_retrieval::RetrievalIndex;

    use super::{Tool, ToolRegistry};
    use crate::{approval::ApprovalRules, directory::EmployeeDirectory};

    // ── Fixtures ──────────────────────────────────────────────────────────────

    /// Meal text embeds to one axis, travel text to another.
    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, text: &str) -> warden_contracts::error::WardenResult<Vec<f32>> {
            let text = text.to_lowercase();
            Ok(if text.contains("meal") || text.contains("lunch") {
                vec![1.0, 0.0, 0.0]
            } else if text.contains("flight") {
                vec![0.0, 1.0, 0.0]
            } else {
                vec![0.0, 0.0, 1.0]
            })
        }
    }

    async fn registry() -> ToolRegistry {
        let directory = EmployeeDirectory::new(
            vec![Employee {
                id: "emp001".to_string(),
                name: None,
                level: "Associate".to_string(),
                department: "Consulting".to_string(),
                permissions: BTreeSet::new(),
            }],
            "employees.json",
        )
        .unwrap();
        let rules = ApprovalRules::new(
            vec![ApprovalRule {
                expense_type: "meal".to_string(),
                level: "Associate".to_string(),
                threshold_amount: 50.0,
            }],
            "rules.toml",
        )
        .unwrap();
        let sections = vec![
            PolicySection {
                id: "expense-001".to_string(),
                category: "expenses".to_string(),
                title: "Meals".to_string(),
                content: "Team meal costs are reimbursed up to the level limit.".to_string(),
            },
            PolicySection {
                id: "travel-002".to_string(),
                category: "travel".to_string(),
                title: "Flights".to_string(),
                content: "Business class flight rules.".to_string(),
            },
        ];
        let index = RetrievalIndex::build(&sections, &ChunkingConfig::default(), Arc::new(AxisEmbedder))
            .await
            .unwrap();
        ToolRegistry::standard(
            Arc::new(directory),
            Arc::new(rules),
            Arc::new(index),
            &WardenConfig::default(),
        )
        .unwrap()
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall::new("c1", name, arguments)
    }

    fn error_code(result: &warden_contracts::tool::ToolResult) -> Option<&'static str> {
        result.error().map(ToolError::code)
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn descriptors_cover_the_three_tools() {
        let names: Vec<String> = registry().await.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["approval_threshold_check", "employee_lookup", "policy_search"]);
    }

    #[tokio::test]
    async fn employee_lookup_returns_record() {
        let result = registry().await.dispatch(&call("employee_lookup", json!({ "employee_id": "emp001" }))).await;
        match result.payload() {
            Some(ToolPayload::Employee(e)) => assert_eq!(e.level, "Associate"),
            other => panic!("expected employee, got {:?}", other),
        }
        assert_eq!(result.call_id, "c1");
    }

    #[tokio::test]
    async fn unknown_employee_is_not_found() {
        let result = registry().await.dispatch(&call("employee_lookup", json!({ "employee_id": "emp404" }))).await;
        assert_eq!(error_code(&result), Some("not_found"));
    }

    #[tokio::test]
    async fn schema_violations_are_invalid_arguments() {
        let r = registry().await;
        for (name, args) in [
            ("employee_lookup", json!({})),
            ("employee_lookup", json!({ "employee_id": "bob" })),
            ("employee_lookup", json!({ "employee_id": "emp001", "extra": true })),
            ("policy_search", json!({ "query": "hi" })),
            ("policy_search", json!({ "query": "meal policy", "max_results": 11 })),
            ("approval_threshold_check", json!({ "employee_id": "emp001", "amount": "40", "expense_type": "meal" })),
            ("approval_threshold_check", json!({ "employee_id": "emp001", "amount": 0, "expense_type": "meal" })),
            ("approval_threshold_check", json!({ "employee_id": "emp001", "amount": 40 })),
        ] {
            let result = r.dispatch(&call(name, args.clone())).await;
            assert_eq!(error_code(&result), Some("invalid_arguments"), "{} {}", name, args);
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_typed() {
        let result = registry().await.dispatch(&call("delete_everything", json!({}))).await;
        assert_eq!(
            result.error(),
            Some(&ToolError::UnknownTool { name: "delete_everything".to_string() })
        );
    }

    #[tokio::test]
    async fn policy_search_applies_threshold_and_flags_empty() {
        let r = registry().await;
        let hit = r.dispatch(&call("policy_search", json!({ "query": "team lunch limit" }))).await;
        match hit.payload() {
            Some(ToolPayload::PolicySearch(s)) => {
                assert!(!s.insufficient_information);
                assert_eq!(s.results[0].id, "expense-001");
                assert_eq!(s.results.len(), 1);
            }
            other => panic!("expected search results, got {:?}", other),
        }

        let miss = r.dispatch(&call("policy_search", json!({ "query": "parental leave" }))).await;
        match miss.payload() {
            Some(ToolPayload::PolicySearch(s)) => {
                assert!(s.insufficient_information);
                assert!(s.results.is_empty());
            }
            other => panic!("expected search results, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn approval_check_uses_employee_level() {
        let result = registry()
            .await
            .dispatch(&call(
                "approval_threshold_check",
                json!({ "employee_id": "emp001", "amount": 40.0, "expense_type": "meal" }),
            ))
            .await;
        match result.payload() {
            Some(ToolPayload::ApprovalCheck(c)) => {
                assert!(!c.requires_approval);
                assert_eq!(c.threshold_amount, 50.0);
                assert_eq!(c.employee_level, "Associate");
            }
            other => panic!("expected approval check, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn approval_check_without_rule_is_typed() {
        let result = registry()
            .await
            .dispatch(&call(
                "approval_threshold_check",
                json!({ "employee_id": "emp001", "amount": 900.0, "expense_type": "software" }),
            ))
            .await;
        assert_eq!(error_code(&result), Some("no_rule_found"));
    }

    // ── Timeout and schema compilation ────────────────────────────────────────

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: "slow".to_string(),
                description: "never finishes in time".to_string(),
                input_schema: json!({ "type": "object" }),
            }
        }

        async fn execute(&self, _arguments: Value) -> Result<ToolPayload, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(ToolError::ToolUnavailable { message: "unreachable".to_string() })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out_as_unavailable() {
        let mut r = ToolRegistry::new(Duration::from_millis(100));
        r.register(SlowTool).unwrap();
        let result = r.dispatch(&call("slow", json!({}))).await;
        match result.error() {
            Some(ToolError::ToolUnavailable { message }) => assert!(message.contains("100 ms")),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    struct BrokenSchemaTool;

    #[async_trait]
    impl Tool for BrokenSchemaTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: "broken".to_string(),
                description: "declares an invalid schema".to_string(),
                input_schema: json!({ "type": 12 }),
            }
        }

        async fn execute(&self, _arguments: Value) -> Result<ToolPayload, ToolError> {
            Err(ToolError::ToolUnavailable { message: "unreachable".to_string() })
        }
    }

    #[test]
    fn invalid_schema_fails_registration() {
        let mut r = ToolRegistry::new(Duration::from_millis(100));
        assert!(matches!(
            r.register(BrokenSchemaTool),
            Err(WardenError::ToolSchemaError { .. })
        ));
        assert!(r.is_empty());
    }
}
