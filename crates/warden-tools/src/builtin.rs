//! The built-in tools: `employee_lookup`, `policy_search`,
//! `approval_threshold_check`.
//!
//! Each tool declares a JSON Schema for its arguments and deserializes them
//! into a typed struct with `deny_unknown_fields`, so a call that slips past
//! one check is still caught by the other.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use warden_contracts::{
    corpus::EMPLOYEE_ID_PATTERN,
    tool::{
        SearchResults, ToolDescriptor, ToolError, ToolPayload, APPROVAL_THRESHOLD_CHECK,
        EMPLOYEE_LOOKUP, POLICY_SEARCH,
    },
};
use warden_retrieval::RetrievalIndex;

use crate::{approval::ApprovalRules, directory::EmployeeDirectory, registry::Tool};

const DEFAULT_MAX_RESULTS: usize = 3;

fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
        message: e.to_string(),
    })
}

// ── employee_lookup ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmployeeLookupArgs {
    employee_id: String,
}

pub struct EmployeeLookup {
    directory: Arc<EmployeeDirectory>,
}

impl EmployeeLookup {
    pub fn new(directory: Arc<EmployeeDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Tool for EmployeeLookup {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: EMPLOYEE_LOOKUP.to_string(),
            description: "Retrieve an employee's level, department, and permissions. Use this \
                          to determine the employee's corporate level before checking policy."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "employee_id": {
                        "type": "string",
                        "description": "Employee ID, e.g. 'emp001'",
                        "pattern": EMPLOYEE_ID_PATTERN
                    }
                },
                "required": ["employee_id"],
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<ToolPayload, ToolError> {
        let args: EmployeeLookupArgs = parse_args(arguments)?;
        self.directory
            .lookup(&args.employee_id)
            .map(|employee| ToolPayload::Employee(employee.clone()))
    }
}

// ── policy_search ─────────────────────────────────────────────────────────────

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicySearchArgs {
    query: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

pub struct PolicySearch {
    index: Arc<RetrievalIndex>,
    threshold: f32,
}

impl PolicySearch {
    pub fn new(index: Arc<RetrievalIndex>, threshold: f32) -> Self {
        Self { index, threshold }
    }
}

#[async_trait]
impl Tool for PolicySearch {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: POLICY_SEARCH.to_string(),
            description: "Search the corporate policy manual. Returns matching sections with \
                          similarity scores. If insufficient_information is true, no policy \
                          applies and you must say you do not have enough information."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Natural language question about company policy",
                        "minLength": 3,
                        "maxLength": 500
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of policy sections to return",
                        "minimum": 1,
                        "maximum": 10,
                        "default": DEFAULT_MAX_RESULTS
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<ToolPayload, ToolError> {
        let args: PolicySearchArgs = parse_args(arguments)?;
        let results = self
            .index
            .retrieve(&args.query, args.max_results, self.threshold)
            .await;
        Ok(ToolPayload::PolicySearch(SearchResults {
            query: args.query,
            threshold: self.threshold,
            insufficient_information: results.is_empty(),
            results,
        }))
    }
}

// ── approval_threshold_check ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ApprovalCheckArgs {
    employee_id: String,
    amount: f64,
    expense_type: String,
}

pub struct ApprovalThresholdCheck {
    directory: Arc<EmployeeDirectory>,
    rules: Arc<ApprovalRules>,
}

impl ApprovalThresholdCheck {
    pub fn new(directory: Arc<EmployeeDirectory>, rules: Arc<ApprovalRules>) -> Self {
        Self { directory, rules }
    }
}

#[async_trait]
impl Tool for ApprovalThresholdCheck {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: APPROVAL_THRESHOLD_CHECK.to_string(),
            description: "Determine whether an expense needs approval, given the employee and \
                          the amount. Returns the applicable threshold and rule."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "employee_id": {
                        "type": "string",
                        "description": "Employee ID requesting the expense",
                        "pattern": EMPLOYEE_ID_PATTERN
                    },
                    "amount": {
                        "type": "number",
                        "description": "Expense amount in USD",
                        "exclusiveMinimum": 0,
                        "maximum": 1000000
                    },
                    "expense_type": {
                        "type": "string",
                        "description": "Type of expense, e.g. 'meal', 'travel', 'software'",
                        "minLength": 1,
                        "maxLength": 100
                    }
                },
                "required": ["employee_id", "amount", "expense_type"],
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<ToolPayload, ToolError> {
        let args: ApprovalCheckArgs = parse_args(arguments)?;
        let employee = self.directory.lookup(&args.employee_id)?;
        self.rules
            .check(employee, &args.expense_type, args.amount)
            .map(ToolPayload::ApprovalCheck)
    }
}
