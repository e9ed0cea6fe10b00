//! Capability implementations for OpenAI-compatible endpoints.
//!
//! Works against any endpoint that speaks the OpenAI REST shape (OpenAI
//! itself, Groq, vLLM, ...). The base URL is configurable per capability;
//! the API key is read from the `OPENAI_API_KEY` environment variable.

use async_trait::async_trait;
use base64::Engine;

use crate::config::{EmbeddingConfig, GenerationConfig, GuardrailConfig, VisionConfig};
use crate::error::PipelineError;
use crate::models::GuardrailVerdict;

use super::http;
use super::{CapabilityError, Embedder, SafetyClassifier, TextGenerator, VisionDescriber};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

fn api_key() -> Result<String, PipelineError> {
    std::env::var("OPENAI_API_KEY")
        .map_err(|_| PipelineError::config("OPENAI_API_KEY environment variable not set"))
}

// ============ Embeddings ============

/// Embedding client for `POST {base}/embeddings`. Batched; retries with
/// backoff on transient failures.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, PipelineError> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| PipelineError::config("embedding.model required for openai provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| PipelineError::config("embedding.dims required for openai provider"))?;

        Ok(Self {
            model,
            dims,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: api_key()?,
            client: http::client(config.timeout_secs).map_err(|e| PipelineError::Embedding(e.0))?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let json = http::post_json(
            &self.client,
            &format!("{}/embeddings", self.base_url),
            Some(&self.api_key),
            &body,
            self.max_retries,
        )
        .await?;

        parse_embeddings_response(&json)
    }
}

fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, CapabilityError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| CapabilityError("embeddings response missing data array".into()))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| CapabilityError("embeddings response missing embedding".into()))?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }

    Ok(embeddings)
}

// ============ Chat (generation) ============

/// Chat-completions client for `POST {base}/chat/completions`.
pub struct OpenAiChat {
    model: String,
    temperature: f32,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAiChat {
    pub fn for_generation(config: &GenerationConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: api_key()?,
            client: http::client(config.timeout_secs)
                .map_err(|e| PipelineError::config(e.0))?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system: &str, user: &str) -> Result<String, CapabilityError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let json = http::post_json(
            &self.client,
            &format!("{}/chat/completions", self.base_url),
            Some(&self.api_key),
            &body,
            self.max_retries,
        )
        .await?;

        http::chat_content(&json)
    }
}

// ============ Vision ============

/// Vision-description client: sends the image as a base64 data URL in a
/// chat message, the way the multimodal chat endpoints expect it.
pub struct OpenAiVision {
    model: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiVision {
    pub fn new(config: &VisionConfig) -> Result<Self, PipelineError> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| PipelineError::config("vision.model required"))?;
        Ok(Self {
            model,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: api_key()?,
            client: http::client(config.timeout_secs)
                .map_err(|e| PipelineError::config(e.0))?,
        })
    }
}

#[async_trait]
impl VisionDescriber for OpenAiVision {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn describe(
        &self,
        image: &[u8],
        content_type: &str,
        instruction: &str,
    ) -> Result<String, CapabilityError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let data_url = format!("data:{content_type};base64,{encoded}");

        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.1,
            "max_tokens": 1024,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": instruction },
                    { "type": "image_url", "image_url": { "url": data_url } },
                ],
            }],
        });

        let json = http::post_json(
            &self.client,
            &format!("{}/chat/completions", self.base_url),
            Some(&self.api_key),
            &body,
            // Vision failures abort only the one artifact; a single retry
            // is enough before surfacing VisionUnavailable.
            1,
        )
        .await?;

        http::chat_content(&json)
    }
}

// ============ Guardrail ============

const CLASSIFIER_SYSTEM_PROMPT: &str = "You are a safety classification system. \
Analyze the text. If it is safe and related to software development or testing, \
reply 'SAFE'. If it is harmful, illegal, malicious, or entirely unrelated to \
software, reply 'UNSAFE' followed by a one-word category.";

/// Safety classifier backed by an instruction-following chat model.
pub struct OpenAiClassifier {
    model: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiClassifier {
    pub fn new(config: &GuardrailConfig) -> Result<Self, PipelineError> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| PipelineError::config("guardrail.model required"))?;
        Ok(Self {
            model,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: api_key()?,
            client: http::client(config.timeout_secs)
                .map_err(|e| PipelineError::config(e.0))?,
        })
    }
}

#[async_trait]
impl SafetyClassifier for OpenAiClassifier {
    async fn classify(&self, text: &str) -> Result<GuardrailVerdict, CapabilityError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.0,
            "messages": [
                { "role": "system", "content": CLASSIFIER_SYSTEM_PROMPT },
                { "role": "user", "content": text },
            ],
        });

        let json = http::post_json(
            &self.client,
            &format!("{}/chat/completions", self.base_url),
            Some(&self.api_key),
            &body,
            1,
        )
        .await?;

        let content = http::chat_content(&json)?;
        Ok(parse_verdict(&content, &self.model))
    }
}

fn parse_verdict(content: &str, model: &str) -> GuardrailVerdict {
    let upper = content.trim().to_uppercase();
    if upper.contains("UNSAFE") {
        let category = upper
            .split_whitespace()
            .nth(1)
            .unwrap_or("UNSAFE")
            .to_lowercase();
        GuardrailVerdict::block(category, format!("classified unsafe by {model}"))
    } else {
        GuardrailVerdict::allow(format!("classified safe by {model}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_embeddings_in_order() {
        let json = serde_json::json!({
            "data": [
                { "embedding": [1.0, 2.0] },
                { "embedding": [3.0, 4.0] },
            ]
        });
        let vecs = parse_embeddings_response(&json).unwrap();
        assert_eq!(vecs, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_missing_data_is_an_error() {
        let json = serde_json::json!({ "error": "nope" });
        assert!(parse_embeddings_response(&json).is_err());
    }

    #[test]
    fn test_safe_reply_allows() {
        let v = parse_verdict("SAFE", "guard");
        assert!(v.allowed);
        assert!(v.category.is_none());
    }

    #[test]
    fn test_unsafe_reply_blocks_with_category() {
        let v = parse_verdict("UNSAFE malware", "guard");
        assert!(!v.allowed);
        assert_eq!(v.category.as_deref(), Some("malware"));
    }
}
