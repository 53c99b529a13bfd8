//! Approval rules and rule selection.
//!
//! Rules are loaded from a TOML document of `[[rules]]` tables. Either
//! selector may be the wildcard `"*"`. For a given expense type and level the
//! most specific matching rule applies:
//!
//! 1. exact expense type, exact level
//! 2. exact expense type, any level
//! 3. any expense type, exact level
//! 4. any expense type, any level
//!
//! Matching is case-insensitive. Two rules with the same selectors are a
//! load error, so selection never has to break a tie.
//!
//! When approval is required, the approver is one rung above the employee on
//! the corporate ladder. Levels at the top or off the ladder go to the CFO.
//!
//! ```toml
//! [[rules]]
//! expense_type = "meal"
//! level = "Associate"
//! threshold_amount = 50.0
//!
//! [[rules]]
//! expense_type = "*"
//! level = "*"
//! threshold_amount = 100.0
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use warden_contracts::{
    corpus::{ApprovalRule, Employee, ANY},
    error::{WardenError, WardenResult},
    tool::{ApprovalCheck, ToolError},
};

/// Corporate levels from junior to senior.
const LEVEL_LADDER: &[&str] = &["Associate", "Senior Consultant", "Manager", "Director", "VP"];
const FINAL_APPROVER: &str = "CFO";

/// The level that signs off on an expense submitted at `level`.
pub fn approver_for(level: &str) -> &'static str {
    LEVEL_LADDER
        .iter()
        .position(|l| l.eq_ignore_ascii_case(level.trim()))
        .and_then(|i| LEVEL_LADDER.get(i + 1))
        .copied()
        .unwrap_or(FINAL_APPROVER)
}

/// The document shape of a rules file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleBook {
    pub rules: Vec<ApprovalRule>,
}

/// A validated, read-only set of approval rules.
#[derive(Debug, Clone)]
pub struct ApprovalRules {
    rules: Vec<ApprovalRule>,
}

impl ApprovalRules {
    /// Validate `rules`: non-empty selectors, finite non-negative thresholds,
    /// no two rules with the same selectors.
    pub fn new(rules: Vec<ApprovalRule>, source_name: &str) -> WardenResult<Self> {
        let fail = |reason: String| WardenError::CorpusError {
            source_name: source_name.to_string(),
            reason,
        };

        let mut seen = BTreeSet::new();
        for (i, rule) in rules.iter().enumerate() {
            if rule.expense_type.trim().is_empty() || rule.level.trim().is_empty() {
                return Err(fail(format!("rule {} has an empty expense_type or level", i + 1)));
            }
            if !rule.threshold_amount.is_finite() || rule.threshold_amount < 0.0 {
                return Err(fail(format!(
                    "rule {} ({}, {}) has invalid threshold_amount {}",
                    i + 1,
                    rule.expense_type,
                    rule.level,
                    rule.threshold_amount
                )));
            }
            let key = (rule.expense_type.to_lowercase(), rule.level.to_lowercase());
            if !seen.insert(key) {
                return Err(fail(format!(
                    "duplicate rule for expense type '{}' at level '{}'",
                    rule.expense_type, rule.level
                )));
            }
        }
        Ok(Self { rules })
    }

    /// Parse `s` as a `RuleBook` and validate it.
    pub fn from_toml_str(s: &str, source_name: &str) -> WardenResult<Self> {
        let book: RuleBook = toml::from_str(s).map_err(|e| WardenError::CorpusError {
            source_name: source_name.to_string(),
            reason: format!("failed to parse rules TOML: {}", e),
        })?;
        Self::new(book.rules, source_name)
    }

    pub fn rules(&self) -> &[ApprovalRule] {
        &self.rules
    }

    /// The most specific rule for `expense_type` at `level`, if any.
    pub fn select(&self, expense_type: &str, level: &str) -> Option<&ApprovalRule> {
        self.rules
            .iter()
            .filter_map(|rule| specificity(rule, expense_type, level).map(|rank| (rank, rule)))
            .max_by_key(|(rank, _)| *rank)
            .map(|(_, rule)| rule)
    }

    /// Check `amount` against the rule for `employee`'s level.
    ///
    /// Approval is required when the amount is strictly above the threshold.
    pub fn check(
        &self,
        employee: &Employee,
        expense_type: &str,
        amount: f64,
    ) -> Result<ApprovalCheck, ToolError> {
        let rule = self
            .select(expense_type, &employee.level)
            .ok_or_else(|| ToolError::NoRuleFound {
                expense_type: expense_type.to_string(),
                level: employee.level.clone(),
            })?;

        debug!(
            employee_id = %employee.id,
            expense_type,
            rule_type = %rule.expense_type,
            rule_level = %rule.level,
            threshold = rule.threshold_amount,
            amount,
            "approval rule selected"
        );

        let requires_approval = amount > rule.threshold_amount;
        Ok(ApprovalCheck {
            employee_id: employee.id.clone(),
            employee_level: employee.level.clone(),
            expense_type: expense_type.to_string(),
            amount,
            requires_approval,
            threshold_amount: rule.threshold_amount,
            applicable_rule: rule.clone(),
            required_approver_level: requires_approval
                .then(|| approver_for(&employee.level).to_string()),
        })
    }
}

/// Rank of `rule` for the given selectors, higher is more specific; `None`
/// when the rule does not apply.
fn specificity(rule: &ApprovalRule, expense_type: &str, level: &str) -> Option<u8> {
    let type_exact = rule.expense_type.eq_ignore_ascii_case(expense_type.trim());
    let level_exact = rule.level.eq_ignore_ascii_case(level.trim());
    let type_any = rule.expense_type == ANY;
    let level_any = rule.level == ANY;

    match (type_exact, type_any, level_exact, level_any) {
        (true, _, true, _) => Some(3),
        (true, _, _, true) => Some(2),
        (_, true, true, _) => Some(1),
        (_, true, _, true) => Some(0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use warden_contracts::{corpus::Employee, error::WardenError, tool::ToolError};

    use super::{approver_for, ApprovalRules};

    const RULES: &str = r#"
[[rules]]
expense_type = "meal"
level = "Associate"
threshold_amount = 50.0

[[rules]]
expense_type = "meal"
level = "*"
threshold_amount = 75.0

[[rules]]
expense_type = "*"
level = "Director"
threshold_amount = 2500.0

[[rules]]
expense_type = "*"
level = "*"
threshold_amount = 100.0
"#;

    fn rules() -> ApprovalRules {
        ApprovalRules::from_toml_str(RULES, "rules.toml").unwrap()
    }

    fn employee(level: &str) -> Employee {
        Employee {
            id: "emp001".to_string(),
            name: None,
            level: level.to_string(),
            department: "Consulting".to_string(),
            permissions: BTreeSet::new(),
        }
    }

    #[test]
    fn exact_rule_beats_wildcards() {
        let check = rules().check(&employee("Associate"), "meal", 40.0).unwrap();
        assert_eq!(check.threshold_amount, 50.0);
        assert!(!check.requires_approval);
        assert_eq!(check.applicable_rule.level, "Associate");
    }

    #[test]
    fn specificity_order_is_type_then_level_then_global() {
        let r = rules();
        assert_eq!(r.select("meal", "Manager").map(|x| x.threshold_amount), Some(75.0));
        assert_eq!(r.select("meal", "Director").map(|x| x.threshold_amount), Some(75.0));
        assert_eq!(r.select("travel", "Director").map(|x| x.threshold_amount), Some(2500.0));
        assert_eq!(r.select("travel", "Associate").map(|x| x.threshold_amount), Some(100.0));
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(rules().select("MEAL", "associate").map(|x| x.threshold_amount), Some(50.0));
    }

    #[test]
    fn threshold_boundary_does_not_require_approval() {
        let r = rules();
        assert!(!r.check(&employee("Associate"), "meal", 50.0).unwrap().requires_approval);
        assert!(r.check(&employee("Associate"), "meal", 50.01).unwrap().requires_approval);
    }

    #[test]
    fn approver_is_named_only_when_approval_is_required() {
        let r = rules();
        let within = r.check(&employee("Associate"), "meal", 40.0).unwrap();
        assert_eq!(within.required_approver_level, None);

        let over = r.check(&employee("Associate"), "meal", 60.0).unwrap();
        assert_eq!(over.required_approver_level.as_deref(), Some("Senior Consultant"));

        let director = r.check(&employee("Director"), "travel", 3000.0).unwrap();
        assert_eq!(director.required_approver_level.as_deref(), Some("VP"));
    }

    #[test]
    fn approver_ladder_tops_out_at_cfo() {
        assert_eq!(approver_for("manager"), "Director");
        assert_eq!(approver_for("VP"), "CFO");
        assert_eq!(approver_for("Intern"), "CFO");
    }

    #[test]
    fn no_applicable_rule_is_a_typed_error() {
        let r = ApprovalRules::from_toml_str(
            "[[rules]]\nexpense_type = \"meal\"\nlevel = \"Associate\"\nthreshold_amount = 50.0\n",
            "rules.toml",
        )
        .unwrap();
        let err = r.check(&employee("Manager"), "travel", 10.0).unwrap_err();
        assert_eq!(
            err,
            ToolError::NoRuleFound {
                expense_type: "travel".to_string(),
                level: "Manager".to_string(),
            }
        );
    }

    #[test]
    fn duplicate_selectors_are_rejected() {
        let doc = "[[rules]]\nexpense_type = \"meal\"\nlevel = \"*\"\nthreshold_amount = 1.0\n\
                   [[rules]]\nexpense_type = \"Meal\"\nlevel = \"*\"\nthreshold_amount = 2.0\n";
        assert!(matches!(
            ApprovalRules::from_toml_str(doc, "rules.toml"),
            Err(WardenError::CorpusError { .. })
        ));
    }

    #[test]
    fn negative_threshold_and_bad_toml_are_rejected() {
        let negative = "[[rules]]\nexpense_type = \"meal\"\nlevel = \"*\"\nthreshold_amount = -1.0\n";
        assert!(ApprovalRules::from_toml_str(negative, "rules.toml").is_err());
        assert!(ApprovalRules::from_toml_str("rules = 3", "rules.toml").is_err());
    }
}
