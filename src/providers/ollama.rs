//! Capability implementations for a local Ollama instance.
//!
//! Embeddings via `POST /api/embed`, generation via `POST /api/chat`.
//! Requires the relevant models to be pulled (e.g. `ollama pull
//! nomic-embed-text`).

use async_trait::async_trait;

use crate::config::{EmbeddingConfig, GenerationConfig};
use crate::error::PipelineError;

use super::http;
use super::{CapabilityError, Embedder, TextGenerator};

const DEFAULT_URL: &str = "http://localhost:11434";

// ============ Embeddings ============

pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, PipelineError> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| PipelineError::config("embedding.model required for ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| PipelineError::config("embedding.dims required for ollama provider"))?;

        Ok(Self {
            model,
            dims,
            url: config.url.clone().unwrap_or_else(|| DEFAULT_URL.to_string()),
            client: http::client(config.timeout_secs).map_err(|e| PipelineError::Embedding(e.0))?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
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
            &format!("{}/api/embed", self.url),
            None,
            &body,
            self.max_retries,
        )
        .await
        .map_err(|e| CapabilityError(format!("(is Ollama running at {}?) {}", self.url, e.0)))?;

        parse_embed_response(&json)
    }
}

fn parse_embed_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, CapabilityError> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| CapabilityError("Ollama response missing embeddings array".into()))?;

    let mut result = Vec::with_capacity(embeddings.len());
    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| CapabilityError("Ollama embedding is not an array".into()))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }

    Ok(result)
}

// ============ Chat (generation) ============

pub struct OllamaChat {
    model: String,
    temperature: f32,
    url: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OllamaChat {
    pub fn new(config: &GenerationConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            url: config.url.clone().unwrap_or_else(|| DEFAULT_URL.to_string()),
            client: http::client(config.timeout_secs)
                .map_err(|e| PipelineError::config(e.0))?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system: &str, user: &str) -> Result<String, CapabilityError> {
        let body = serde_json::json!({
            "model": self.model,
            "stream": false,
            "options": { "temperature": self.temperature },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let json = http::post_json(
            &self.client,
            &format!("{}/api/chat", self.url),
            None,
            &body,
            self.max_retries,
        )
        .await
        .map_err(|e| CapabilityError(format!("(is Ollama running at {}?) {}", self.url, e.0)))?;

        json.get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| CapabilityError("Ollama chat response missing message.content".into()))
    }
}
