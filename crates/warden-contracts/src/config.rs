//! TOML configuration for the pipeline.
//!
//! Every field has a default, so an empty document is a valid configuration.
//! The retrieval threshold and the escalation threshold are independent
//! knobs even though both default to 0.7.
//!
//! ```toml
//! [retrieval]
//! top_k = 5
//! threshold = 0.7
//!
//! [orchestration]
//! max_iterations = 5
//!
//! [output]
//! escalation_threshold = 0.7
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{WardenError, WardenResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardrailConfig {
    /// Maximum sanitized query length, in characters.
    pub max_input_length: usize,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self { max_input_length: 2000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Minimum similarity a chunk needs to be returned at all.
    pub threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkingConfig {
    pub window_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_tokens: 400,
            overlap_tokens: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestrationConfig {
    /// Maximum model round-trips per request.
    pub max_iterations: u32,
    pub tool_timeout_ms: u64,
    pub model_timeout_ms: u64,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            tool_timeout_ms: 5_000,
            model_timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Decisions below this confidence are routed to a human.
    pub escalation_threshold: f64,
    /// Checked amounts above this always get human review.
    pub high_value_review_amount: f64,
    /// E-mail addresses in this domain are not treated as PII.
    pub internal_email_domain: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            escalation_threshold: 0.7,
            high_value_review_amount: 5_000.0,
            internal_email_domain: "company.com".to_string(),
        }
    }
}

/// Corpus file locations. Relative paths resolve against the directory of
/// the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorpusConfig {
    pub policies: PathBuf,
    pub employees: PathBuf,
    pub rules: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            policies: PathBuf::from("policies.json"),
            employees: PathBuf::from("employees.json"),
            rules: PathBuf::from("rules.toml"),
        }
    }
}

impl CorpusConfig {
    fn resolve_against(&mut self, base: &Path) {
        for path in [&mut self.policies, &mut self.employees, &mut self.rules] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WardenConfig {
    pub guardrails: GuardrailConfig,
    pub retrieval: RetrievalConfig,
    pub chunking: ChunkingConfig,
    pub orchestration: OrchestrationConfig,
    pub output: OutputConfig,
    pub corpus: CorpusConfig,
}

impl WardenConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> WardenResult<Self> {
        let config: WardenConfig = toml::from_str(s).map_err(|e| WardenError::ConfigError {
            reason: format!("failed to parse configuration TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path`, parse it, and resolve corpus paths relative to it.
    pub fn from_file(path: &Path) -> WardenResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| WardenError::ConfigError {
            reason: format!("failed to read configuration file '{}': {}", path.display(), e),
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.corpus.resolve_against(base);
        Ok(config)
    }

    /// Check cross-field and range constraints.
    pub fn validate(&self) -> WardenResult<()> {
        let fail = |reason: String| Err(WardenError::ConfigError { reason });

        if self.guardrails.max_input_length == 0 {
            return fail("guardrails.max_input_length must be positive".into());
        }
        if self.retrieval.top_k == 0 {
            return fail("retrieval.top_k must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.retrieval.threshold) {
            return fail(format!(
                "retrieval.threshold must be within [0, 1], got {}",
                self.retrieval.threshold
            ));
        }
        if self.chunking.window_tokens == 0 {
            return fail("chunking.window_tokens must be positive".into());
        }
        if self.chunking.overlap_tokens >= self.chunking.window_tokens {
            return fail(format!(
                "chunking.overlap_tokens ({}) must be smaller than window_tokens ({})",
                self.chunking.overlap_tokens, self.chunking.window_tokens
            ));
        }
        if self.orchestration.max_iterations == 0 {
            return fail("orchestration.max_iterations must be positive".into());
        }
        if self.orchestration.tool_timeout_ms == 0 || self.orchestration.model_timeout_ms == 0 {
            return fail("orchestration timeouts must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.output.escalation_threshold) {
            return fail(format!(
                "output.escalation_threshold must be within [0, 1], got {}",
                self.output.escalation_threshold
            ));
        }
        if !self.output.high_value_review_amount.is_finite()
            || self.output.high_value_review_amount < 0.0
        {
            return fail("output.high_value_review_amount must be a non-negative number".into());
        }
        Ok(())
    }
}
