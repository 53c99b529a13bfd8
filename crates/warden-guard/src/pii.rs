//! PII screening for decision text.
//!
//! Covers government ID numbers (`NNN-NN-NNNN`), 16-digit payment card
//! numbers with optional separators, and e-mail addresses outside the
//! organisation's own domain.

use std::fmt;

use regex::{Captures, Regex};

use warden_contracts::error::{WardenError, WardenResult};

const SSN_PATTERN: &str = r"\b\d{3}-\d{2}-\d{4}\b";
const CARD_PATTERN: &str = r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b";
const EMAIL_PATTERN: &str = r"\b[A-Za-z0-9._%+-]+@([A-Za-z0-9.-]+\.[A-Za-z]{2,})\b";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiiKind {
    GovernmentId,
    PaymentCard,
    ExternalEmail,
}

impl fmt::Display for PiiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::GovernmentId => "government_id",
            Self::PaymentCard => "payment_card",
            Self::ExternalEmail => "external_email",
        })
    }
}

#[derive(Debug, Clone)]
pub struct PiiScreen {
    ssn: Regex,
    card: Regex,
    email: Regex,
    internal_domain: String,
}

impl PiiScreen {
    pub fn new(internal_domain: &str) -> WardenResult<Self> {
        Ok(Self {
            ssn: compile(SSN_PATTERN)?,
            card: compile(CARD_PATTERN)?,
            email: compile(EMAIL_PATTERN)?,
            internal_domain: internal_domain.trim().to_ascii_lowercase(),
        })
    }

    /// Kinds of PII present in `text`, in a fixed order.
    pub fn detect(&self, text: &str) -> Vec<PiiKind> {
        let mut found = vec![];
        if self.ssn.is_match(text) {
            found.push(PiiKind::GovernmentId);
        }
        if self.card.is_match(text) {
            found.push(PiiKind::PaymentCard);
        }
        if self
            .email
            .captures_iter(text)
            .any(|c| !self.is_internal(&c[1]))
        {
            found.push(PiiKind::ExternalEmail);
        }
        found
    }

    /// Replace every detected item with a redaction marker.
    pub fn redact(&self, text: &str) -> String {
        let text = self.ssn.replace_all(text, "[SSN REDACTED]");
        let text = self.card.replace_all(&text, "[CARD REDACTED]");
        self.email
            .replace_all(&text, |c: &Captures<'_>| {
                if self.is_internal(&c[1]) {
                    c[0].to_string()
                } else {
                    "[EMAIL REDACTED]".to_string()
                }
            })
            .into_owned()
    }

    fn is_internal(&self, domain: &str) -> bool {
        !self.internal_domain.is_empty() && domain.eq_ignore_ascii_case(&self.internal_domain)
    }
}

fn compile(pattern: &str) -> WardenResult<Regex> {
    Regex::new(pattern).map_err(|e| WardenError::ConfigError {
        reason: format!("invalid PII pattern '{}': {}", pattern, e),
    })
}
