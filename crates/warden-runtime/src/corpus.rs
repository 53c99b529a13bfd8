//! Reference corpus loading.
//!
//! Three files make up a corpus:
//!
//! - `policies.json`: `{"policies": [PolicySection, ...]}`
//! - `employees.json`: `{"employees": [Employee, ...]}`
//! - `rules.toml`: `[[rules]]` approval rules
//!
//! Loading is all or nothing. A malformed document, an unknown field, a
//! blank or duplicate id: each is a `CorpusError` naming the file, and
//! nothing is skipped.

use std::{collections::BTreeSet, path::Path};

use serde::{de::DeserializeOwned, Deserialize};
use tracing::info;

use warden_contracts::{
    config::CorpusConfig,
    corpus::{Employee, PolicySection},
    error::{WardenError, WardenResult},
};
use warden_tools::{ApprovalRules, EmployeeDirectory};

const DEMO_POLICIES: &str = include_str!("../data/policies.json");
const DEMO_EMPLOYEES: &str = include_str!("../data/employees.json");
const DEMO_RULES: &str = include_str!("../data/rules.toml");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyManual {
    policies: Vec<PolicySection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmployeeRoster {
    employees: Vec<Employee>,
}

/// Validated reference data, ready to build an index and tools from.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub sections: Vec<PolicySection>,
    pub directory: EmployeeDirectory,
    pub rules: ApprovalRules,
}

impl Corpus {
    /// Load the three files named by `config`.
    pub fn load(config: &CorpusConfig) -> WardenResult<Self> {
        let corpus = Self::from_strs(
            &read(&config.policies)?,
            &config.policies.display().to_string(),
            &read(&config.employees)?,
            &config.employees.display().to_string(),
            &read(&config.rules)?,
            &config.rules.display().to_string(),
        )?;
        info!(
            sections = corpus.sections.len(),
            employees = corpus.directory.len(),
            rules = corpus.rules.rules().len(),
            "corpus loaded"
        );
        Ok(corpus)
    }

    /// The corpus bundled with the crate.
    pub fn demo() -> WardenResult<Self> {
        Self::from_strs(
            DEMO_POLICIES,
            "policies.json",
            DEMO_EMPLOYEES,
            "employees.json",
            DEMO_RULES,
            "rules.toml",
        )
    }

    pub fn from_strs(
        policies: &str,
        policies_name: &str,
        employees: &str,
        employees_name: &str,
        rules: &str,
        rules_name: &str,
    ) -> WardenResult<Self> {
        let manual: PolicyManual = parse_json(policies, policies_name)?;
        validate_sections(&manual.policies, policies_name)?;

        let roster: EmployeeRoster = parse_json(employees, employees_name)?;
        let directory = EmployeeDirectory::new(roster.employees, employees_name)?;

        let rules = ApprovalRules::from_toml_str(rules, rules_name)?;

        Ok(Self {
            sections: manual.policies,
            directory,
            rules,
        })
    }
}

fn read(path: &Path) -> WardenResult<String> {
    std::fs::read_to_string(path).map_err(|e| WardenError::CorpusError {
        source_name: path.display().to_string(),
        reason: format!("failed to read file: {}", e),
    })
}

fn parse_json<T: DeserializeOwned>(contents: &str, source_name: &str) -> WardenResult<T> {
    serde_json::from_str(contents).map_err(|e| WardenError::CorpusError {
        source_name: source_name.to_string(),
        reason: e.to_string(),
    })
}

fn validate_sections(sections: &[PolicySection], source_name: &str) -> WardenResult<()> {
    let fail = |reason: String| {
        Err(WardenError::CorpusError {
            source_name: source_name.to_string(),
            reason,
        })
    };

    if sections.is_empty() {
        return fail("the policy manual has no sections".to_string());
    }
    let mut seen = BTreeSet::new();
    for section in sections {
        if section.id.trim().is_empty() || section.id.contains('#') {
            return fail(format!("invalid section id '{}'", section.id));
        }
        if section.title.trim().is_empty() || section.content.trim().is_empty() {
            return fail(format!("section '{}' has a blank title or content", section.id));
        }
        if !seen.insert(section.id.as_str()) {
            return fail(format!("duplicate section id '{}'", section.id));
        }
    }
    Ok(())
}
