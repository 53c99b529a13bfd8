//! Read-only employee directory.

use std::collections::BTreeMap;

use regex::Regex;

use warden_contracts::{
    corpus::{Employee, EMPLOYEE_ID_PATTERN},
    error::{WardenError, WardenResult},
    tool::ToolError,
};

#[derive(Debug, Clone, Default)]
pub struct EmployeeDirectory {
    by_id: BTreeMap<String, Employee>,
}

impl EmployeeDirectory {
    /// Index `employees` by id. Malformed or repeated ids and blank levels
    /// are corpus errors.
    pub fn new(employees: Vec<Employee>, source_name: &str) -> WardenResult<Self> {
        let id_format = Regex::new(EMPLOYEE_ID_PATTERN).map_err(|e| WardenError::ConfigError {
            reason: format!("invalid employee id pattern: {}", e),
        })?;
        let mut by_id = BTreeMap::new();
        for employee in employees {
            if !id_format.is_match(&employee.id) {
                return Err(WardenError::CorpusError {
                    source_name: source_name.to_string(),
                    reason: format!(
                        "employee id '{}' does not match {}",
                        employee.id, EMPLOYEE_ID_PATTERN
                    ),
                });
            }
            if employee.level.trim().is_empty() {
                return Err(WardenError::CorpusError {
                    source_name: source_name.to_string(),
                    reason: format!("employee '{}' has a blank level", employee.id),
                });
            }
            if by_id.contains_key(&employee.id) {
                return Err(WardenError::CorpusError {
                    source_name: source_name.to_string(),
                    reason: format!("duplicate employee id '{}'", employee.id),
                });
            }
            by_id.insert(employee.id.clone(), employee);
        }
        Ok(Self { by_id })
    }

    pub fn lookup(&self, employee_id: &str) -> Result<&Employee, ToolError> {
        self.by_id
            .get(employee_id)
            .ok_or_else(|| ToolError::NotFound {
                employee_id: employee_id.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn employee(id: &str, level: &str) -> Employee {
        Employee {
            id: id.to_string(),
            name: Some("Sam Doe".to_string()),
            level: level.to_string(),
            department: "Consulting".to_string(),
            permissions: BTreeSet::from(["travel".to_string()]),
        }
    }

    #[test]
    fn lookup_finds_known_and_reports_unknown() {
        let dir = EmployeeDirectory::new(vec![employee("emp001", "Associate")], "employees.json").unwrap();
        assert_eq!(dir.lookup("emp001").map(|e| e.level.as_str()), Ok("Associate"));
        assert_eq!(
            dir.lookup("emp999").unwrap_err(),
            ToolError::NotFound { employee_id: "emp999".to_string() }
        );
    }

    #[test]
    fn duplicates_and_blank_levels_are_corpus_errors() {
        let dup = vec![employee("emp001", "Associate"), employee("emp001", "Manager")];
        assert!(matches!(
            EmployeeDirectory::new(dup, "employees.json"),
            Err(WardenError::CorpusError { .. })
        ));
        assert!(EmployeeDirectory::new(vec![employee("emp002", " ")], "employees.json").is_err());
    }

    #[test]
    fn ids_outside_the_shared_format_are_corpus_errors() {
        for id in ["EMP001", "emp1", "", "e-001"] {
            assert!(
                matches!(
                    EmployeeDirectory::new(vec![employee(id, "Associate")], "employees.json"),
                    Err(WardenError::CorpusError { .. })
                ),
                "{}",
                id
            );
        }
    }
}
