//! Input-side validation results.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why the input guardrail refused a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    TooLong,
    InjectionDetected,
    EmptyInput,
    SuspiciousEncoding,
    InvalidEmployeeId,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TooLong => "too_long",
            Self::InjectionDetected => "injection_detected",
            Self::EmptyInput => "empty_input",
            Self::SuspiciousEncoding => "suspicious_encoding",
            Self::InvalidEmployeeId => "invalid_employee_id",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse risk classification attached to a rejection, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Outcome of screening raw user text.
///
/// Exactly one of the sanitized input or the rejection reason exists, which
/// the enum shape makes impossible to violate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationResult {
    Valid {
        sanitized_input: String,
    },
    Rejected {
        rejection_reason: RejectionReason,
        risk_level: RiskLevel,
    },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    pub fn sanitized_input(&self) -> Option<&str> {
        match self {
            Self::Valid { sanitized_input } => Some(sanitized_input),
            Self::Rejected { .. } => None,
        }
    }

    pub fn rejection_reason(&self) -> Option<RejectionReason> {
        match self {
            Self::Valid { .. } => None,
            Self::Rejected { rejection_reason, .. } => Some(*rejection_reason),
        }
    }
}
