//! Error taxonomy for the ingestion and generation pipeline.
//!
//! Every failure the pipeline can surface to a caller is a [`PipelineError`]
//! variant. A guardrail block is deliberately *not* an error: it is a
//! designed refusal outcome, modeled as
//! [`QueryOutcome::Refused`](crate::pipeline::QueryOutcome).

use thiserror::Error;

/// A structured schema-validation failure.
///
/// Produced when a generated payload does not conform to the target schema.
/// Carries the field path and expectation so the repair prompt can quote a
/// precise correction instead of a free-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Path to the offending field, e.g. `test_cases[2].steps`.
    pub path: String,
    /// What the schema expected at that path, e.g. `non-empty array of strings`.
    pub expected: String,
    /// Human-readable detail of what was found instead.
    pub message: String,
}

impl SchemaViolation {
    pub fn new(
        path: impl Into<String>,
        expected: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "at `{}`: expected {} ({})",
            self.path, self.expected, self.message
        )
    }
}

/// Failures surfaced by pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A format reader could not parse an artifact (corrupt file,
    /// unsupported encoding or content type).
    #[error("extraction failed for '{artifact}': {reason}")]
    Extraction { artifact: String, reason: String },

    /// The vision-description capability errored or timed out.
    #[error("vision capability unavailable for '{artifact}': {reason}")]
    VisionUnavailable { artifact: String, reason: String },

    /// The embedding capability errored after exhausting retries.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Invalid configuration (chunking bounds, dimensionality mismatch).
    /// Fails fast, before any processing.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The structured generator exhausted its repair attempts.
    #[error("generation failed after {attempts} attempt(s): {last}")]
    GenerationFailed {
        attempts: u32,
        last: SchemaViolation,
    },

    /// A caller-supplied deadline expired at an external-call boundary.
    #[error("deadline exceeded during {stage}")]
    Timeout { stage: &'static str },

    /// Storage backend failure.
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        PipelineError::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_display_includes_path_and_expectation() {
        let v = SchemaViolation::new(
            "test_cases[0].steps",
            "non-empty array of strings",
            "found null",
        );
        let s = v.to_string();
        assert!(s.contains("test_cases[0].steps"));
        assert!(s.contains("non-empty array of strings"));
    }
}
