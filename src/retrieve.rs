//! Query-time retrieval: embed the query, rank stored chunks, apply the
//! score floor.

use tracing::debug;

use crate::config::RetrievalConfig;
use crate::error::PipelineError;
use crate::models::{Query, RetrievedContext, ScoredChunk};
use crate::providers::Embedder;
use crate::store::{VectorFilter, VectorStore};

/// Retrieve the top-K most similar chunks for `query`.
///
/// An empty index yields an empty context, not an error. The result is
/// ordered by score descending (ties broken by insertion order in the
/// store), holds no duplicate chunk ids, and never exceeds the requested
/// top-K.
///
/// # Errors
///
/// [`PipelineError::Config`] when the embedder's dimensionality does not
/// match the index; [`PipelineError::Embedding`] when the query cannot be
/// embedded.
pub async fn retrieve(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    query: &Query,
    config: &RetrievalConfig,
) -> Result<RetrievedContext, PipelineError> {
    if let Some(meta) = store.meta().await? {
        if meta.dims != embedder.dims() {
            return Err(PipelineError::config(format!(
                "index was built with {} dimensions but embedder '{}' produces {}",
                meta.dims,
                embedder.model_name(),
                embedder.dims()
            )));
        }
    } else {
        // Nothing ingested yet.
        return Ok(RetrievedContext::default());
    }

    let vectors = embedder
        .embed(std::slice::from_ref(&query.text))
        .await
        .map_err(|e| PipelineError::Embedding(e.to_string()))?;
    let query_vec = vectors
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::Embedding("embedder returned no vector".to_string()))?;

    let filter = VectorFilter {
        artifact_id: query.artifact_id.clone(),
        kinds: query.kinds.clone(),
    };
    let candidates = store.query(&query_vec, query.top_k, &filter).await?;

    let chunks: Vec<ScoredChunk> = candidates
        .into_iter()
        .filter(|c| config.min_score.map_or(true, |floor| c.score >= floor))
        .map(|c| ScoredChunk {
            chunk_id: c.chunk_id,
            artifact_id: c.artifact_id,
            seq: c.seq,
            kind: c.kind,
            text: c.text,
            score: c.score,
        })
        .collect();

    debug!(hits = chunks.len(), top_k = query.top_k, "retrieval complete");
    Ok(RetrievedContext { chunks })
}
