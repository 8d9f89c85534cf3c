//! Query-side orchestration.
//!
//! Embeds a free-text query with the same provider used at ingestion and
//! returns the top-k cosine-ranked chunks, optionally scoped by a
//! metadata filter. Generating a natural-language answer from the
//! returned fragments is the caller's job.

use anyhow::{Context, Result};
use tracing::debug;

use crate::embedding::Embedder;
use crate::models::{MetadataFilter, ScoredChunk};
use crate::store::VectorStore;

/// Retrieve up to `top_k` chunks ranked by similarity to `query`.
///
/// A blank query yields an empty result; an embedding provider failure
/// propagates rather than degrading to an empty ranking.
pub async fn answer_query(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    query: &str,
    top_k: usize,
    filter: Option<&MetadataFilter>,
) -> Result<Vec<ScoredChunk>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let query_vector = embedder
        .embed(query)
        .await
        .context("failed to embed query")?;

    let results = store.similarity_search(&query_vector, top_k, filter).await?;
    debug!(top_k, returned = results.len(), "similarity search complete");
    Ok(results)
}
