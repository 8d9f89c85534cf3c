//! Ingestion pipeline orchestration.
//!
//! One call per uploaded document: extract text segments, split each
//! segment into overlapping chunks, embed every chunk, then append all
//! records to the store in one atomic batch. Embedding calls for a
//! document run concurrently; if any of them fails the whole document is
//! abandoned with no store write, so a document is never half-ingested.
//!
//! Re-ingesting an existing `file_name` appends a second generation of
//! chunks unless `replace` is set, in which case the prior generation is
//! swapped for the new one in a single store commit.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tracing::{debug, info};
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::extract;
use crate::models::{ChunkMetadata, ChunkRecord, IngestReport};
use crate::split::Splitter;
use crate::store::VectorStore;

/// Caller-supplied tags stamped onto every chunk of one ingestion.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub project: String,
    pub category: String,
    pub description: String,
    /// Atomically swap out the document's prior chunk generation.
    pub replace: bool,
}

/// Ingest a document from raw bytes.
///
/// This is the core entry point; [`ingest_file`] wraps it with a disk
/// read. A failed run leaves the store unchanged for this document
/// (including its prior generation when `replace` is set) and must be
/// retried from the beginning.
pub async fn ingest_bytes(
    store: &dyn VectorStore,
    embedder: Arc<dyn Embedder>,
    splitter: Splitter,
    file_name: &str,
    file_path: &str,
    bytes: &[u8],
    opts: &IngestOptions,
) -> Result<IngestReport> {
    let segments = extract::load(file_name, bytes);
    let segment_count = segments.len();

    let mut texts: Vec<String> = Vec::new();
    for segment in &segments {
        debug!(file_name, origin = %segment.origin, chars = segment.text.len(), "extracted segment");
        texts.extend(splitter.split(&segment.text));
    }

    let vectors = embed_all(embedder, &texts)
        .await
        .with_context(|| format!("embedding failed, ingestion of {} abandoned", file_name))?;

    // One metadata stamp shared by every chunk of this ingestion.
    let metadata = ChunkMetadata {
        file_name: file_name.to_string(),
        file_path: file_path.to_string(),
        project: opts.project.clone(),
        category: opts.category.clone(),
        description: opts.description.clone(),
        ingested_at: chrono::Utc::now().to_rfc3339(),
    };

    let records: Vec<ChunkRecord> = texts
        .into_iter()
        .zip(vectors)
        .map(|(text, embedding)| ChunkRecord {
            id: Uuid::new_v4().to_string(),
            text,
            embedding,
            metadata: metadata.clone(),
        })
        .collect();

    let chunks_written = records.len();
    let replaced_prior = if opts.replace {
        store
            .replace(file_name, &records)
            .await
            .with_context(|| format!("store write failed, ingestion of {} abandoned", file_name))?
    } else {
        store
            .add(&records)
            .await
            .with_context(|| format!("store write failed, ingestion of {} abandoned", file_name))?;
        false
    };

    info!(file_name, chunks = chunks_written, project = %opts.project, "document ingested");

    Ok(IngestReport {
        file_name: file_name.to_string(),
        segments: segment_count,
        chunks_written,
        replaced_prior,
    })
}

/// Ingest a document from disk. The document's `file_name` is the
/// path's final component.
pub async fn ingest_file(
    store: &dyn VectorStore,
    embedder: Arc<dyn Embedder>,
    splitter: Splitter,
    path: &Path,
    opts: &IngestOptions,
) -> Result<IngestReport> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("invalid file name: {}", path.display()))?
        .to_string();
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    ingest_bytes(
        store,
        embedder,
        splitter,
        &file_name,
        &path.display().to_string(),
        &bytes,
        opts,
    )
    .await
}

/// Embed every chunk text concurrently, preserving input order.
///
/// The first failure aborts the whole batch (remaining tasks are
/// dropped with the JoinSet) — partial embedding of a document is a
/// correctness hazard, never an outcome.
async fn embed_all(embedder: Arc<dyn Embedder>, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let mut set = JoinSet::new();
    for (i, text) in texts.iter().enumerate() {
        let embedder = Arc::clone(&embedder);
        let text = text.clone();
        set.spawn(async move { (i, embedder.embed(&text).await) });
    }

    let mut vectors: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
    while let Some(joined) = set.join_next().await {
        let (i, result) = joined.context("embedding task panicked")?;
        vectors[i] = Some(result?);
    }

    vectors
        .into_iter()
        .map(|v| v.context("embedding task produced no result"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::store::memory::InMemoryStore;
    use anyhow::bail;
    use async_trait::async_trait;

    fn opts(project: &str) -> IngestOptions {
        IngestOptions {
            project: project.to_string(),
            category: "report".to_string(),
            description: "fixture".to_string(),
            replace: false,
        }
    }

    async fn ingest_text(
        store: &InMemoryStore,
        file_name: &str,
        text: &str,
        opts: &IngestOptions,
    ) -> Result<IngestReport> {
        ingest_bytes(
            store,
            Arc::new(HashEmbedder::new(32)),
            Splitter::new(15, 5).unwrap(),
            file_name,
            &format!("/uploads/{}", file_name),
            text.as_bytes(),
            opts,
        )
        .await
    }

    #[tokio::test]
    async fn ingest_then_get_reconstructs_the_text() {
        let store = InMemoryStore::new();
        let text = "Hello world. This is a test.";
        let report = ingest_text(&store, "a.txt", text, &opts("p")).await.unwrap();
        assert!(report.chunks_written > 0);

        let entries = store.fetch_document("a.txt").await.unwrap();
        assert_eq!(entries.len(), report.chunks_written);

        // Strip the 5-char overlap from every chunk after the first.
        let mut rebuilt = entries[0].text.clone();
        for entry in &entries[1..] {
            rebuilt.extend(entry.text.chars().skip(5));
        }
        assert_eq!(rebuilt, text);
    }

    #[tokio::test]
    async fn all_chunks_share_one_metadata_stamp() {
        let store = InMemoryStore::new();
        ingest_text(&store, "a.txt", "Hello world. This is a test.", &opts("p"))
            .await
            .unwrap();
        let entries = store.fetch_document("a.txt").await.unwrap();
        assert!(entries.len() > 1);
        for entry in &entries[1..] {
            assert_eq!(entry.metadata, entries[0].metadata);
        }
        assert_eq!(entries[0].metadata.project, "p");
        assert_eq!(entries[0].metadata.file_path, "/uploads/a.txt");
    }

    #[tokio::test]
    async fn reingest_appends_a_second_generation() {
        let store = InMemoryStore::new();
        ingest_text(&store, "a.txt", "first generation", &opts("p"))
            .await
            .unwrap();
        let first = store.fetch_document("a.txt").await.unwrap().len();
        let report = ingest_text(&store, "a.txt", "second generation", &opts("p"))
            .await
            .unwrap();
        assert!(!report.replaced_prior);
        let total = store.fetch_document("a.txt").await.unwrap().len();
        assert_eq!(total, first + report.chunks_written);
    }

    #[tokio::test]
    async fn replace_deletes_the_prior_generation_first() {
        let store = InMemoryStore::new();
        ingest_text(&store, "a.txt", "first generation", &opts("p"))
            .await
            .unwrap();
        let mut replace_opts = opts("p");
        replace_opts.replace = true;
        let report = ingest_text(&store, "a.txt", "second generation", &replace_opts)
            .await
            .unwrap();
        assert!(report.replaced_prior);
        let entries = store.fetch_document("a.txt").await.unwrap();
        assert_eq!(entries.len(), report.chunks_written);
        assert!(entries[0].text.starts_with("second"));
    }

    #[tokio::test]
    async fn failed_replace_ingest_keeps_the_old_generation() {
        let store = InMemoryStore::new();
        ingest_text(&store, "a.txt", "first generation", &opts("p"))
            .await
            .unwrap();
        ingest_text(&store, "other.txt", "anchor document", &opts("p"))
            .await
            .unwrap();

        // Replace with a different embedding dimensionality: the store
        // rejects the batch, and a.txt's prior chunks must survive.
        let mut replace_opts = opts("p");
        replace_opts.replace = true;
        let result = ingest_bytes(
            &store,
            Arc::new(HashEmbedder::new(16)),
            Splitter::new(15, 5).unwrap(),
            "a.txt",
            "/uploads/a.txt",
            b"second generation",
            &replace_opts,
        )
        .await;
        assert!(result.is_err());
        let entries = store.fetch_document("a.txt").await.unwrap();
        assert!(!entries.is_empty());
        assert!(entries[0].text.starts_with("first"));
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            8
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            bail!("provider unavailable")
        }
    }

    #[tokio::test]
    async fn embedding_failure_leaves_the_store_unchanged() {
        let store = InMemoryStore::new();
        let result = ingest_bytes(
            &store,
            Arc::new(FailingEmbedder),
            Splitter::new(15, 5).unwrap(),
            "a.txt",
            "/uploads/a.txt",
            b"some document text",
            &opts("p"),
        )
        .await;
        assert!(result.is_err());
        assert!(store.fetch_document("a.txt").await.unwrap().is_empty());
        assert!(store.scan(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_still_produces_a_record() {
        let store = InMemoryStore::new();
        let report = ingest_bytes(
            &store,
            Arc::new(HashEmbedder::new(32)),
            Splitter::new(200, 20).unwrap(),
            "broken.pdf",
            "/uploads/broken.pdf",
            b"this is not a pdf",
            &opts("p"),
        )
        .await
        .unwrap();
        assert_eq!(report.chunks_written, 1);
        let entries = store.fetch_document("broken.pdf").await.unwrap();
        assert!(entries[0].text.contains("could not extract text"));
    }
}
