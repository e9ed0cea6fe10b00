//! Pipeline facade: wires the stages together and owns the stage-boundary
//! deadline checks.
//!
//! Index time: normalize → chunk → embed → store, one artifact per call.
//! Query time: guardrail → retrieve → generate/repair → assemble →
//! guardrail. A guardrail block ends the query with
//! [`QueryOutcome::Refused`]; everything else that stops the pipeline is a
//! [`PipelineError`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::error::PipelineError;
use crate::generate;
use crate::guardrail::GuardrailFilter;
use crate::index::Indexer;
use crate::models::{Artifact, GuardrailVerdict, Query, TestSuite};
use crate::normalize;
use crate::providers::{self, Embedder, TextGenerator, VisionDescriber};
use crate::retrieve;
use crate::store::{sqlite::SqliteStore, VectorStore};
use crate::suite;

/// Optional wall-clock budget for one pipeline operation. Checked before
/// every external call; in-flight calls are bounded by the per-capability
/// HTTP timeouts instead.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    /// No budget; only the per-capability timeouts apply.
    pub fn none() -> Self {
        Self { expires_at: None }
    }

    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Some(Instant::now() + budget),
        }
    }

    pub fn check(&self, stage: &'static str) -> Result<(), PipelineError> {
        match self.expires_at {
            Some(t) if Instant::now() >= t => Err(PipelineError::Timeout { stage }),
            _ => Ok(()),
        }
    }
}

/// Result of one query: a validated suite, or a designed refusal.
#[derive(Debug)]
pub enum QueryOutcome {
    Suite(TestSuite),
    Refused(GuardrailVerdict),
}

/// Report returned by a successful ingestion.
#[derive(Debug)]
pub struct IngestReport {
    pub artifact_id: String,
    pub chunks: usize,
}

/// Owns the store handle and the capability backends.
pub struct Pipeline {
    config: Config,
    store: Arc<dyn VectorStore>,
    embedder: Box<dyn Embedder>,
    generator: Box<dyn TextGenerator>,
    vision: Option<Box<dyn VisionDescriber>>,
    guardrail: GuardrailFilter,
    indexer: Indexer,
}

impl Pipeline {
    /// Build a pipeline with injected backends. Tests use this with stub
    /// capabilities and the in-memory store.
    pub fn new(
        config: Config,
        store: Arc<dyn VectorStore>,
        embedder: Box<dyn Embedder>,
        generator: Box<dyn TextGenerator>,
        vision: Option<Box<dyn VisionDescriber>>,
        guardrail: GuardrailFilter,
    ) -> Self {
        let indexer = Indexer::new(&config.embedding);
        Self {
            config,
            store,
            embedder,
            generator,
            vision,
            guardrail,
            indexer,
        }
    }

    /// Open the configured SQLite store and instantiate the configured
    /// capability backends.
    pub async fn connect(config: Config) -> Result<Self, PipelineError> {
        crate::config::validate(&config)?;
        let store = SqliteStore::open(&config.db.path).await?;
        let embedder = providers::create_embedder(&config.embedding)?;
        let generator = providers::create_generator(&config.generation)?;
        let vision = providers::create_vision(&config.vision)?;
        let guardrail = GuardrailFilter::new(providers::create_classifier(&config.guardrail)?);
        Ok(Self::new(
            config,
            Arc::new(store),
            embedder,
            generator,
            vision,
            guardrail,
        ))
    }

    pub fn store(&self) -> &dyn VectorStore {
        self.store.as_ref()
    }

    /// Ingest one artifact: normalize, chunk, embed, and atomically replace
    /// its index entries. Re-ingesting the same artifact id with unchanged
    /// content reproduces identical chunk rows.
    #[instrument(skip(self, artifact), fields(artifact = %artifact.id))]
    pub async fn ingest(
        &self,
        artifact: &Artifact,
        deadline: Deadline,
    ) -> Result<IngestReport, PipelineError> {
        deadline.check("normalization")?;
        let normalized = normalize::normalize(artifact, self.vision.as_deref()).await?;

        let chunks = chunk_text(&artifact.id, &normalized.text, &self.config.chunking);
        info!(chunks = chunks.len(), via = ?normalized.provenance, "artifact normalized");

        self.indexer
            .index_artifact(
                self.store.as_ref(),
                self.embedder.as_ref(),
                artifact,
                &chunks,
                &deadline,
            )
            .await?;

        Ok(IngestReport {
            artifact_id: artifact.id.clone(),
            chunks: chunks.len(),
        })
    }

    /// Remove an artifact's chunks and vectors from the index.
    pub async fn delete(&self, artifact_id: &str) -> Result<(), PipelineError> {
        self.store.delete_artifact(artifact_id).await?;
        info!(artifact = artifact_id, "artifact deleted");
        Ok(())
    }

    /// Answer one query with a schema-validated suite, or refuse it.
    #[instrument(skip(self, query), fields(query = %query.text))]
    pub async fn query(
        &self,
        query: &Query,
        deadline: Deadline,
    ) -> Result<QueryOutcome, PipelineError> {
        deadline.check("guardrail")?;
        let pre_verdict = self.guardrail.check_query(&query.text).await;
        if !pre_verdict.allowed {
            info!(category = ?pre_verdict.category, "query refused at pre-check");
            return Ok(QueryOutcome::Refused(pre_verdict));
        }

        deadline.check("retrieval")?;
        let context = retrieve::retrieve(
            self.store.as_ref(),
            self.embedder.as_ref(),
            query,
            &self.config.retrieval,
        )
        .await?;

        let outcome = generate::generate_suite(
            self.generator.as_ref(),
            &context,
            &query.text,
            &self.config.generation,
            &deadline,
        )
        .await?;

        let mut suite = suite::assemble(
            outcome.payload,
            &query.text,
            self.generator.model_name(),
            outcome.attempts,
            vec![pre_verdict],
        );

        deadline.check("guardrail")?;
        let post_verdict = self.guardrail.check_suite(&suite).await;
        if !post_verdict.allowed {
            info!(category = ?post_verdict.category, "suite refused at post-check");
            return Ok(QueryOutcome::Refused(post_verdict));
        }
        suite.meta.verdicts.push(post_verdict);
        Ok(QueryOutcome::Suite(suite))
    }
}
