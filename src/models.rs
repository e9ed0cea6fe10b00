//! Core data models that flow through the casegen pipeline.
//!
//! Index-time types ([`Artifact`] → [`NormalizedText`] → [`Chunk`]) and
//! query-time types ([`Query`] → [`RetrievedContext`] → [`TestSuite`]).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deterministic chunk IDs (UUIDv5 over `artifact_id:seq`).
/// Stable so that re-ingesting unchanged content reproduces identical IDs.
const CHUNK_ID_NS: Uuid = Uuid::from_bytes([
    0x6b, 0x1f, 0x0c, 0x2e, 0x9a, 0x41, 0x4d, 0x53, 0x8f, 0x0a, 0xc3, 0x7d, 0x55, 0x21, 0x8e, 0x04,
]);

/// Media kind of an uploaded knowledge-base input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Prose documents: plain text, markdown, PDF, DOCX.
    Text,
    /// Machine-readable specs: JSON, YAML, CSV.
    Structured,
    /// Screenshots and diagrams, described via the vision capability.
    Image,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Text => write!(f, "text"),
            MediaKind::Structured => write!(f, "structured"),
            MediaKind::Image => write!(f, "image"),
        }
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MediaKind::Text),
            "structured" => Ok(MediaKind::Structured),
            "image" => Ok(MediaKind::Image),
            other => Err(format!("unknown media kind: {other}")),
        }
    }
}

/// Raw content of an artifact before normalization.
#[derive(Debug, Clone)]
pub enum ArtifactContent {
    /// Text already decoded by the caller.
    Text(String),
    /// Raw bytes with a content type (PDF, DOCX, image formats).
    Bytes { content_type: String, data: Vec<u8> },
}

/// A single uploaded knowledge-base input. Immutable once ingested;
/// re-ingesting the same `id` atomically replaces its index entries.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Stable identity. Same id + same content ⇒ identical index entries.
    pub id: String,
    pub filename: String,
    pub kind: MediaKind,
    pub content: ArtifactContent,
}

/// Which path produced an artifact's normalized text. Vision-derived text
/// is tagged so downstream consumers can discount its precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "via")]
pub enum Provenance {
    /// A format-specific reader, e.g. `"pdf"` or `"utf-8"`.
    Reader { format: String },
    /// The vision-description capability.
    Vision { model: String },
}

/// Plain-text form of one artifact. One artifact yields exactly one.
#[derive(Debug, Clone)]
pub struct NormalizedText {
    pub artifact_id: String,
    pub text: String,
    pub provenance: Provenance,
}

/// A bounded, possibly overlapping text segment; the retrieval unit.
///
/// `start`/`end` are character offsets into the parent [`NormalizedText`].
/// Concatenating the non-overlapping portions (`prev.end..end`) in sequence
/// order reconstructs the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub artifact_id: String,
    /// Position within the artifact; defines insertion order.
    pub seq: i64,
    pub text: String,
    pub start: usize,
    pub end: usize,
    /// SHA-256 of `text`, for staleness detection.
    pub hash: String,
}

impl Chunk {
    /// Deterministic chunk ID: UUIDv5 over `artifact_id:seq`.
    pub fn derive_id(artifact_id: &str, seq: i64) -> String {
        Uuid::new_v5(&CHUNK_ID_NS, format!("{artifact_id}:{seq}").as_bytes()).to_string()
    }
}

/// A free-text question plus retrieval bounds and optional narrowing filters.
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub top_k: usize,
    /// Restrict candidates to these media kinds (empty = all).
    pub kinds: Vec<MediaKind>,
    /// Restrict candidates to one artifact.
    pub artifact_id: Option<String>,
}

impl Query {
    pub fn new(text: impl Into<String>, top_k: usize) -> Self {
        Self {
            text: text.into(),
            top_k,
            kinds: Vec::new(),
            artifact_id: None,
        }
    }
}

/// One retrieved chunk with its similarity score and source metadata.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub artifact_id: String,
    pub seq: i64,
    pub kind: MediaKind,
    pub text: String,
    /// Cosine similarity against the query embedding.
    pub score: f32,
}

/// Ordered retrieval result: scores non-increasing, length ≤ requested
/// top-K, no duplicate chunk ids. Enforced by the retriever.
#[derive(Debug, Clone, Default)]
pub struct RetrievedContext {
    pub chunks: Vec<ScoredChunk>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }
}

/// Outcome of one guardrail checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailVerdict {
    pub allowed: bool,
    /// Blocking category when `allowed` is false, e.g. `"unsafe"`.
    pub category: Option<String>,
    pub rationale: String,
}

impl GuardrailVerdict {
    pub fn allow(rationale: impl Into<String>) -> Self {
        Self {
            allowed: true,
            category: None,
            rationale: rationale.into(),
        }
    }

    pub fn block(category: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            allowed: false,
            category: Some(category.into()),
            rationale: rationale.into(),
        }
    }
}

/// Classification of a generated test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseKind {
    Positive,
    Negative,
    Boundary,
}

/// One generated test case, schema-validated before it reaches callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub title: String,
    pub goal: String,
    pub preconditions: String,
    #[serde(default)]
    pub test_data: Option<String>,
    pub steps: Vec<String>,
    pub expected_results: String,
    #[serde(rename = "type")]
    pub kind: CaseKind,
    #[serde(default)]
    pub negative_cases: Vec<String>,
    #[serde(default)]
    pub boundary_cases: Vec<String>,
}

/// Provenance metadata attached to a generated suite.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationMeta {
    /// Identifier of the generation model used.
    pub model: String,
    /// Total generation calls issued (1 + repairs).
    pub attempts: u32,
    /// Guardrail verdicts observed, in checkpoint order.
    pub verdicts: Vec<GuardrailVerdict>,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

/// The final ordered test-case suite returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct TestSuite {
    pub cases: Vec<TestCase>,
    pub query: String,
    /// Model-reported status, e.g. `"missing_info"` when the supplied
    /// context was insufficient.
    pub status: Option<String>,
    pub missing_info_questions: Vec<String>,
    pub meta: GenerationMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_ids_deterministic() {
        assert_eq!(Chunk::derive_id("a1", 0), Chunk::derive_id("a1", 0));
        assert_ne!(Chunk::derive_id("a1", 0), Chunk::derive_id("a1", 1));
        assert_ne!(Chunk::derive_id("a1", 0), Chunk::derive_id("a2", 0));
    }

    #[test]
    fn test_case_kind_roundtrips_through_json() {
        let json = serde_json::json!({
            "title": "Signup works",
            "goal": "Verify signup",
            "preconditions": "none",
            "steps": ["open page", "submit form"],
            "expected_results": "account created",
            "type": "positive"
        });
        let case: TestCase = serde_json::from_value(json).unwrap();
        assert_eq!(case.kind, CaseKind::Positive);
        assert!(case.negative_cases.is_empty());
    }

    #[test]
    fn test_media_kind_parses() {
        assert_eq!("image".parse::<MediaKind>().unwrap(), MediaKind::Image);
        assert!("video".parse::<MediaKind>().is_err());
    }
}
