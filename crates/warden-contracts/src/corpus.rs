//! Reference data loaded once at startup: employees, approval rules, and the
//! policy manual sections that are chunked into the retrieval index.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Wildcard value for `ApprovalRule::expense_type` and `ApprovalRule::level`.
pub const ANY: &str = "*";

/// Format of `Employee::id`. The input guardrail and the tool schemas both
/// enforce it.
pub const EMPLOYEE_ID_PATTERN: &str = r"^emp\d{3}$";

/// An employee record from the reference corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Employee {
    /// Stable identifier, e.g. "emp001".
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Corporate level name, e.g. "Associate" or "Senior Consultant".
    pub level: String,
    pub department: String,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

/// A spend threshold for one expense type at one level.
///
/// Either field may be `"*"`, which turns the rule into a fallback that
/// applies when no more specific rule exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApprovalRule {
    pub expense_type: String,
    pub level: String,
    /// Amounts strictly above this value require approval.
    pub threshold_amount: f64,
}

/// One section of the policy manual as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySection {
    /// Section reference cited by decisions, e.g. "travel-001".
    pub id: String,
    pub category: String,
    pub title: String,
    pub content: String,
}
