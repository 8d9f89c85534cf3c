//! Vector storage abstraction.
//!
//! The [`VectorStore`] trait is the only storage surface the rest of the
//! pipeline sees; the SQLite and in-memory backends are interchangeable
//! behind it. Both rank by exhaustive cosine scan over every candidate
//! chunk. Secondary indexes on `project` and `file_name` speed up the
//! scoped operations without changing the contract.

pub mod memory;
pub mod sqlite;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::Config;
use crate::embedding::cosine_similarity;
use crate::models::{ChunkEntry, ChunkMetadata, ChunkRecord, MetadataFilter, ScoredChunk};

/// Durable collection of (text, vector, metadata) records.
///
/// Chunks are append-only and immutable; the only mutation besides
/// `add` is whole-document deletion. All chunks in the store share one
/// embedding dimensionality — `add` rejects a batch whose vectors differ
/// from each other or from existing contents, since mixing models
/// requires a full re-ingest.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append one ingestion's chunks. Atomic: on failure no chunk of the
    /// batch becomes visible.
    async fn add(&self, records: &[ChunkRecord]) -> Result<()>;

    /// Delete any prior chunks of `file_name` and append `records`, as
    /// one atomic step: on failure the prior generation is still there
    /// and none of `records` is visible. Returns whether prior chunks
    /// existed.
    async fn replace(&self, file_name: &str, records: &[ChunkRecord]) -> Result<bool>;

    /// Up to `k` chunks ranked by cosine similarity to `query`,
    /// descending, ties broken by insertion order. Candidates are first
    /// narrowed by `filter` when supplied.
    async fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>>;

    /// Metadata of all (filtered) chunks in insertion order. No vectors
    /// are read; this backs project and document enumeration.
    async fn scan(&self, filter: Option<&MetadataFilter>) -> Result<Vec<ChunkMetadata>>;

    /// Every chunk of one document in original chunk order. Empty when
    /// the document is absent.
    async fn fetch_document(&self, file_name: &str) -> Result<Vec<ChunkEntry>>;

    /// Remove every chunk of the named document. Returns `true` if at
    /// least one chunk was removed; an unknown name is not an error.
    async fn delete_by_file_name(&self, file_name: &str) -> Result<bool>;
}

/// Open the backend named in the configuration.
pub async fn open_store(config: &Config) -> Result<Box<dyn VectorStore>> {
    match config.store.backend.as_str() {
        "sqlite" => Ok(Box::new(sqlite::SqliteStore::open(&config.store).await?)),
        "memory" => Ok(Box::new(memory::InMemoryStore::new())),
        other => bail!("Unknown store backend: {}", other),
    }
}

/// Validate that a batch is uniformly dimensioned and consistent with
/// what the store already holds.
pub(crate) fn check_batch_dims(records: &[ChunkRecord], existing_dims: Option<usize>) -> Result<()> {
    let Some(first) = records.first() else {
        return Ok(());
    };
    let dims = first.embedding.len();
    if dims == 0 {
        bail!("refusing to store zero-dimensional embeddings");
    }
    if records.iter().any(|r| r.embedding.len() != dims) {
        bail!("embedding dimensionality differs within one ingestion batch");
    }
    if let Some(existing) = existing_dims {
        if existing != dims {
            bail!(
                "store holds {}-dimensional embeddings but the batch has {}; \
                 changing embedding models requires a full re-ingest",
                existing,
                dims
            );
        }
    }
    Ok(())
}

/// Rank `(metadata, text, vector)` candidates against a query vector.
///
/// Candidates must arrive in insertion order: the sort is stable, so
/// equal scores keep that order.
pub(crate) fn rank_candidates(
    query: &[f32],
    candidates: Vec<(ChunkMetadata, String, Vec<f32>)>,
    k: usize,
) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = candidates
        .into_iter()
        .map(|(metadata, text, vector)| ScoredChunk {
            score: cosine_similarity(query, &vector),
            text,
            metadata,
        })
        .collect();
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(file_name: &str) -> ChunkMetadata {
        ChunkMetadata {
            file_name: file_name.to_string(),
            file_path: String::new(),
            project: "p".to_string(),
            category: String::new(),
            description: String::new(),
            ingested_at: String::new(),
        }
    }

    fn record(text: &str, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.to_string(),
            embedding,
            metadata: meta("a.txt"),
        }
    }

    #[test]
    fn empty_batch_passes_dim_check() {
        assert!(check_batch_dims(&[], Some(4)).is_ok());
    }

    #[test]
    fn mixed_dims_within_batch_are_rejected() {
        let batch = vec![record("a", vec![1.0, 0.0]), record("b", vec![1.0])];
        assert!(check_batch_dims(&batch, None).is_err());
    }

    #[test]
    fn batch_must_match_store_dims() {
        let batch = vec![record("a", vec![1.0, 0.0])];
        assert!(check_batch_dims(&batch, Some(3)).is_err());
        assert!(check_batch_dims(&batch, Some(2)).is_ok());
        assert!(check_batch_dims(&batch, None).is_ok());
    }

    #[test]
    fn zero_dim_embeddings_are_rejected() {
        let batch = vec![record("a", vec![])];
        assert!(check_batch_dims(&batch, None).is_err());
    }

    #[test]
    fn ranking_is_descending_and_bounded() {
        let candidates = vec![
            (meta("a"), "far".to_string(), vec![0.0, 1.0]),
            (meta("a"), "near".to_string(), vec![1.0, 0.0]),
            (meta("a"), "mid".to_string(), vec![1.0, 1.0]),
        ];
        let ranked = rank_candidates(&[1.0, 0.0], candidates, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].text, "near");
        assert_eq!(ranked[1].text, "mid");
        assert!(ranked[0].score >= ranked[1].score);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let candidates = vec![
            (meta("a"), "first".to_string(), vec![1.0, 0.0]),
            (meta("a"), "second".to_string(), vec![2.0, 0.0]),
            (meta("a"), "third".to_string(), vec![1.0, 0.0]),
        ];
        // All three are colinear with the query, so all score 1.0.
        let ranked = rank_candidates(&[1.0, 0.0], candidates, 3);
        let texts: Vec<&str> = ranked.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }
}
