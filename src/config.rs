//! TOML configuration parsing and fail-fast validation.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub guardrail: GuardrailConfig,
    #[serde(default)]
    pub vision: VisionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub max_chars: usize,
    /// Characters of overlap carried into the next chunk.
    #[serde(default = "default_overlap")]
    pub overlap_chars: usize,
}

fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Candidates below this cosine similarity are dropped. `None` keeps all.
    #[serde(default)]
    pub min_score: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: None,
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"`, `"ollama"`, or `"disabled"`.
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// `"openai"` (any OpenAI-compatible endpoint) or `"ollama"`.
    #[serde(default = "default_openai")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Repair attempts after the first validation failure.
    #[serde(default = "default_max_repair_attempts")]
    pub max_repair_attempts: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    /// Upper bound on prompt context, in characters. Lowest-scoring
    /// chunks are dropped first when exceeded.
    #[serde(default = "default_input_budget")]
    pub input_budget_chars: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_openai(),
            model: default_generation_model(),
            url: None,
            temperature: default_temperature(),
            max_repair_attempts: default_max_repair_attempts(),
            max_retries: default_max_retries(),
            timeout_secs: default_generation_timeout(),
            input_budget_chars: default_input_budget(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GuardrailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: None,
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct VisionConfig {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model: None,
            url: None,
            timeout_secs: default_generation_timeout(),
        }
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_openai() -> String {
    "openai".to_string()
}
fn default_generation_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_repair_attempts() -> u32 {
    2
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_generation_timeout() -> u64 {
    120
}
fn default_input_budget() -> usize {
    24_000
}

pub fn load_config(path: &Path) -> Result<Config, PipelineError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::config(format!("failed to read config file {}: {e}", path.display()))
    })?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| PipelineError::config(format!("failed to parse config file: {e}")))?;

    validate(&config)?;
    Ok(config)
}

/// Fail-fast validation: invalid chunking or provider settings are rejected
/// before any processing starts.
pub fn validate(config: &Config) -> Result<(), PipelineError> {
    if config.chunking.max_chars == 0 {
        return Err(PipelineError::config("chunking.max_chars must be > 0"));
    }
    // overlap >= max would make the chunker's cursor stop advancing.
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        return Err(PipelineError::config(format!(
            "chunking.overlap_chars ({}) must be < chunking.max_chars ({})",
            config.chunking.overlap_chars, config.chunking.max_chars
        )));
    }

    if config.retrieval.top_k == 0 {
        return Err(PipelineError::config("retrieval.top_k must be >= 1"));
    }

    if config.embedding.is_enabled() {
        match config.embedding.provider.as_str() {
            "openai" | "ollama" => {}
            other => {
                return Err(PipelineError::config(format!(
                    "unknown embedding provider '{other}': must be openai, ollama, or disabled"
                )))
            }
        }
        if config.embedding.model.is_none() {
            return Err(PipelineError::config(
                "embedding.model must be set when the provider is enabled",
            ));
        }
        match config.embedding.dims {
            Some(d) if d > 0 => {}
            _ => {
                return Err(PipelineError::config(
                    "embedding.dims must be > 0 when the provider is enabled",
                ))
            }
        }
    }

    match config.generation.provider.as_str() {
        "openai" | "ollama" => {}
        other => {
            return Err(PipelineError::config(format!(
                "unknown generation provider '{other}': must be openai or ollama"
            )))
        }
    }

    if config.guardrail.enabled && config.guardrail.model.is_none() {
        return Err(PipelineError::config(
            "guardrail.model must be set when guardrail.enabled = true",
        ));
    }

    Ok(())
}
