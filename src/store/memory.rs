//! In-memory [`VectorStore`] backend.
//!
//! A `Vec` of records behind an `RwLock`; insertion order is the vector
//! order. Useful for tests and for embedding the library without a
//! database file. Similarity search is the same brute-force cosine scan
//! the SQLite backend performs.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{ChunkEntry, ChunkMetadata, ChunkRecord, MetadataFilter, ScoredChunk};

use super::{check_batch_dims, rank_candidates, VectorStore};

/// In-memory store for tests and embedded use.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<Vec<ChunkRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn filter_matches(filter: Option<&MetadataFilter>, meta: &ChunkMetadata) -> bool {
    filter.map_or(true, |f| f.matches(meta))
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn add(&self, records: &[ChunkRecord]) -> Result<()> {
        let mut stored = self.records.write().await;
        let existing_dims = stored.first().map(|r| r.embedding.len());
        check_batch_dims(records, existing_dims)?;
        // Single extend under the write lock: all chunks of the batch
        // become visible together.
        stored.extend(records.iter().cloned());
        Ok(())
    }

    async fn replace(&self, file_name: &str, records: &[ChunkRecord]) -> Result<bool> {
        let mut stored = self.records.write().await;
        // Dimensionality is checked against what survives the delete, so
        // replacing the sole document may legitimately change models.
        let existing_dims = stored
            .iter()
            .find(|r| r.metadata.file_name != file_name)
            .map(|r| r.embedding.len());
        check_batch_dims(records, existing_dims)?;
        let before = stored.len();
        stored.retain(|r| r.metadata.file_name != file_name);
        let removed = stored.len() < before;
        stored.extend(records.iter().cloned());
        Ok(removed)
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        let stored = self.records.read().await;
        let candidates: Vec<_> = stored
            .iter()
            .filter(|r| filter_matches(filter, &r.metadata))
            .map(|r| (r.metadata.clone(), r.text.clone(), r.embedding.clone()))
            .collect();
        Ok(rank_candidates(query, candidates, k))
    }

    async fn scan(&self, filter: Option<&MetadataFilter>) -> Result<Vec<ChunkMetadata>> {
        let stored = self.records.read().await;
        Ok(stored
            .iter()
            .filter(|r| filter_matches(filter, &r.metadata))
            .map(|r| r.metadata.clone())
            .collect())
    }

    async fn fetch_document(&self, file_name: &str) -> Result<Vec<ChunkEntry>> {
        let stored = self.records.read().await;
        Ok(stored
            .iter()
            .filter(|r| r.metadata.file_name == file_name)
            .map(|r| ChunkEntry {
                text: r.text.clone(),
                metadata: r.metadata.clone(),
            })
            .collect())
    }

    async fn delete_by_file_name(&self, file_name: &str) -> Result<bool> {
        let mut stored = self.records.write().await;
        let before = stored.len();
        stored.retain(|r| r.metadata.file_name != file_name);
        Ok(stored.len() < before)
    }
}
