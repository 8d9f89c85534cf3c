//! End-to-end library tests: ingest documents through the full
//! extract → split → embed → store path and retrieve them back, using the
//! in-memory store and the offline hash embedder.

use std::sync::Arc;

use docvault::embedding::{Embedder, HashEmbedder};
use docvault::index;
use docvault::ingest::{ingest_bytes, IngestOptions};
use docvault::models::MetadataFilter;
use docvault::retrieve::answer_query;
use docvault::split::Splitter;
use docvault::store::memory::InMemoryStore;
use docvault::store::VectorStore;

fn embedder() -> Arc<dyn Embedder> {
    Arc::new(HashEmbedder::new(64))
}

fn opts(project: &str) -> IngestOptions {
    IngestOptions {
        project: project.to_string(),
        category: "notes".to_string(),
        description: String::new(),
        replace: false,
    }
}

#[tokio::test]
async fn ingested_text_is_retrievable_by_its_own_content() {
    let store = InMemoryStore::new();
    let splitter = Splitter::new(200, 20).unwrap();

    let body = "The quarterly revenue forecast projects steady growth \
                across all regions, driven by the new subscription tier.";
    ingest_bytes(
        &store,
        embedder(),
        splitter,
        "forecast.md",
        "/docs/forecast.md",
        body.as_bytes(),
        &opts("finance"),
    )
    .await
    .unwrap();

    let hits = answer_query(&store, &HashEmbedder::new(64), body, 3, None)
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].metadata.file_name, "forecast.md");
    assert!((hits[0].score - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn project_filter_scopes_retrieval() {
    let store = InMemoryStore::new();
    let e = embedder();

    for (name, project, text) in [
        ("a.md", "alpha", "kubernetes deployment runbook"),
        ("b.md", "beta", "kubernetes deployment runbook"),
    ] {
        ingest_bytes(
            &store,
            Arc::clone(&e),
            Splitter::new(200, 20).unwrap(),
            name,
            name,
            text.as_bytes(),
            &opts(project),
        )
        .await
        .unwrap();
    }

    let filter = MetadataFilter {
        project: Some("beta".to_string()),
        ..Default::default()
    };
    let hits = answer_query(
        &store,
        &HashEmbedder::new(64),
        "kubernetes deployment runbook",
        10,
        Some(&filter),
    )
    .await
    .unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.metadata.project == "beta"));
}

#[tokio::test]
async fn listings_reflect_ingested_documents() {
    let store = InMemoryStore::new();
    let e = embedder();

    for (name, project) in [("one.md", "alpha"), ("two.md", "alpha"), ("three.md", "beta")] {
        ingest_bytes(
            &store,
            Arc::clone(&e),
            Splitter::new(200, 20).unwrap(),
            name,
            name,
            b"some text",
            &opts(project),
        )
        .await
        .unwrap();
    }

    assert_eq!(index::list_projects(&store).await.unwrap(), vec!["alpha", "beta"]);
    assert_eq!(
        index::list_documents(&store, "alpha").await.unwrap(),
        vec!["one.md", "two.md"]
    );
    assert!(index::list_documents(&store, "gamma").await.unwrap().is_empty());
}

#[tokio::test]
async fn show_returns_chunks_in_ingestion_order() {
    let store = InMemoryStore::new();

    // 26 chars split at size 10 / overlap 2 -> windows of stride 8.
    let body = "abcdefghijklmnopqrstuvwxyz";
    ingest_bytes(
        &store,
        embedder(),
        Splitter::new(10, 2).unwrap(),
        "alphabet.txt",
        "alphabet.txt",
        body.as_bytes(),
        &opts("demo"),
    )
    .await
    .unwrap();

    let chunks = index::get_document(&store, "alphabet.txt").await.unwrap();
    assert_eq!(chunks[0].text, "abcdefghij");
    assert_eq!(chunks[1].text, "ijklmnopqr");
    // Consecutive chunks share the configured overlap.
    for pair in chunks.windows(2) {
        let tail = &pair[0].text[pair[0].text.len() - 2..];
        let head = &pair[1].text[..2];
        assert_eq!(tail, head);
    }
}

#[tokio::test]
async fn replace_swaps_generations_and_delete_clears() {
    let store = InMemoryStore::new();
    let e = embedder();
    let base = opts("demo");

    ingest_bytes(
        &store,
        Arc::clone(&e),
        Splitter::new(200, 20).unwrap(),
        "doc.md",
        "doc.md",
        b"first version",
        &base,
    )
    .await
    .unwrap();

    // Plain re-ingest appends a second generation.
    ingest_bytes(
        &store,
        Arc::clone(&e),
        Splitter::new(200, 20).unwrap(),
        "doc.md",
        "doc.md",
        b"second version",
        &base,
    )
    .await
    .unwrap();
    assert_eq!(index::get_document(&store, "doc.md").await.unwrap().len(), 2);

    // --replace discards everything stored before.
    let replace = IngestOptions {
        replace: true,
        ..base.clone()
    };
    let report = ingest_bytes(
        &store,
        Arc::clone(&e),
        Splitter::new(200, 20).unwrap(),
        "doc.md",
        "doc.md",
        b"third version",
        &replace,
    )
    .await
    .unwrap();
    assert!(report.replaced_prior);

    let chunks = index::get_document(&store, "doc.md").await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "third version");

    assert!(store.delete_by_file_name("doc.md").await.unwrap());
    assert!(index::get_document(&store, "doc.md").await.unwrap().is_empty());
    assert!(!store.delete_by_file_name("doc.md").await.unwrap());
}

#[tokio::test]
async fn unreadable_document_still_yields_a_record() {
    let store = InMemoryStore::new();

    // Invalid PDF bytes: extraction degrades to a placeholder chunk.
    ingest_bytes(
        &store,
        embedder(),
        Splitter::new(200, 20).unwrap(),
        "broken.pdf",
        "broken.pdf",
        b"not a pdf at all",
        &opts("demo"),
    )
    .await
    .unwrap();

    let chunks = index::get_document(&store, "broken.pdf").await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].text.contains("could not extract text"));
}

#[tokio::test]
async fn mixed_dimensions_are_rejected() {
    let store = InMemoryStore::new();

    ingest_bytes(
        &store,
        Arc::new(HashEmbedder::new(64)),
        Splitter::new(200, 20).unwrap(),
        "a.md",
        "a.md",
        b"text",
        &opts("demo"),
    )
    .await
    .unwrap();

    // A second document embedded at a different dimensionality must not land.
    let err = ingest_bytes(
        &store,
        Arc::new(HashEmbedder::new(32)),
        Splitter::new(200, 20).unwrap(),
        "b.md",
        "b.md",
        b"text",
        &opts("demo"),
    )
    .await
    .unwrap_err();
    assert!(format!("{:#}", err).contains("dimension"));
    assert!(index::get_document(&store, "b.md").await.unwrap().is_empty());
}
