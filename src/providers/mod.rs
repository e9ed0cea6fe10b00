//! External capability abstractions and implementations.
//!
//! The pipeline consumes four blocking network capabilities through traits:
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`Embedder`] | Text → fixed-length vector |
//! | [`TextGenerator`] | Prompt → raw model output |
//! | [`VisionDescriber`] | Image → textual description |
//! | [`SafetyClassifier`] | Text → allow/block verdict |
//!
//! Concrete implementations: [`openai`] (any OpenAI-compatible endpoint,
//! including Groq) and [`ollama`] (local Ollama instance). Tests inject
//! stub implementations; nothing in the pipeline depends on a concrete
//! backend.
//!
//! Transport errors are retried inside the implementations with exponential
//! backoff (1s, 2s, 4s, ... capped) up to the configured cap, then surfaced
//! as [`CapabilityError`]. The calling pipeline stage decides which
//! taxonomy error that becomes.

pub mod http;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{EmbeddingConfig, GenerationConfig, GuardrailConfig, VisionConfig};
use crate::error::PipelineError;
use crate::models::GuardrailVerdict;

/// Transport-level failure of an external capability, after retries.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CapabilityError(pub String);

/// Embedding capability: maps text to a fixed-length numeric vector.
///
/// `dims` must be stable for the process lifetime; the store enforces it
/// against index metadata.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;
    fn dims(&self) -> usize;
    /// Embed a batch of texts, preserving input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError>;
}

/// Generation capability: prompt in, raw text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, system: &str, user: &str) -> Result<String, CapabilityError>;
}

/// Vision-description capability for image artifacts.
#[async_trait]
pub trait VisionDescriber: Send + Sync {
    fn model_name(&self) -> &str;
    async fn describe(
        &self,
        image: &[u8],
        content_type: &str,
        instruction: &str,
    ) -> Result<String, CapabilityError>;
}

/// Safety-classification capability used by the guardrail checkpoints.
#[async_trait]
pub trait SafetyClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<GuardrailVerdict, CapabilityError>;
}

/// Instantiate the configured embedding backend.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>, PipelineError> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(openai::OpenAiEmbedder::new(config)?)),
        "ollama" => Ok(Box::new(ollama::OllamaEmbedder::new(config)?)),
        "disabled" => Err(PipelineError::config(
            "embedding provider is disabled; set [embedding] provider in config",
        )),
        other => Err(PipelineError::config(format!(
            "unknown embedding provider: {other}"
        ))),
    }
}

/// Instantiate the configured generation backend.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn TextGenerator>, PipelineError> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(openai::OpenAiChat::for_generation(config)?)),
        "ollama" => Ok(Box::new(ollama::OllamaChat::new(config)?)),
        other => Err(PipelineError::config(format!(
            "unknown generation provider: {other}"
        ))),
    }
}

/// Instantiate the vision backend, if one is configured.
pub fn create_vision(
    config: &VisionConfig,
) -> Result<Option<Box<dyn VisionDescriber>>, PipelineError> {
    match &config.model {
        Some(_) => Ok(Some(Box::new(openai::OpenAiVision::new(config)?))),
        None => Ok(None),
    }
}

/// Instantiate the safety classifier, if the guardrail is enabled.
pub fn create_classifier(
    config: &GuardrailConfig,
) -> Result<Option<Box<dyn SafetyClassifier>>, PipelineError> {
    if !config.enabled {
        return Ok(None);
    }
    Ok(Some(Box::new(openai::OpenAiClassifier::new(config)?)))
}
