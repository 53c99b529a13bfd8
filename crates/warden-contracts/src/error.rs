//! Startup and boundary error types for the Warden pipeline.
//!
//! Request-time failures never surface as `WardenError` to a caller: the
//! pipeline converts them into a terminal `PolicyDecision`. These variants
//! cover the places where failing loudly is correct (bad configuration,
//! malformed corpus files, an index that cannot be built) plus the typed
//! conditions that cross crate boundaries before being resolved.

use thiserror::Error;

/// The unified error type for the Warden crates.
#[derive(Debug, Error)]
pub enum WardenError {
    /// A configuration value is missing, malformed, or out of range.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A corpus file could not be read or contains an invalid record.
    ///
    /// Corpus errors are fatal at startup; records are never silently skipped.
    #[error("corpus error in '{source_name}': {reason}")]
    CorpusError { source_name: String, reason: String },

    /// The embedding capability failed.
    #[error("embedding failed: {reason}")]
    EmbeddingFailed { reason: String },

    /// A tool's declared input schema could not be compiled.
    #[error("tool '{tool}' has an invalid input schema: {reason}")]
    ToolSchemaError { tool: String, reason: String },

    /// The model capability failed or timed out.
    #[error("model unavailable: {reason}")]
    ModelUnavailable { reason: String },

    /// The model's final answer does not match the decision schema.
    #[error("schema violation: {reason}")]
    SchemaViolation { reason: String },

    /// A decision-trail record could not be appended.
    #[error("decision trail write failed: {reason}")]
    TrailWriteFailed { reason: String },
}

impl WardenError {
    /// Stable snake_case code for logs and trail records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError { .. } => "config_error",
            Self::CorpusError { .. } => "corpus_error",
            Self::EmbeddingFailed { .. } => "embedding_failed",
            Self::ToolSchemaError { .. } => "tool_schema_error",
            Self::ModelUnavailable { .. } => "model_unavailable",
            Self::SchemaViolation { .. } => "schema_violation",
            Self::TrailWriteFailed { .. } => "trail_write_failed",
        }
    }
}

/// Convenience alias used throughout the Warden crates.
pub type WardenResult<T> = Result<T, WardenError>;
