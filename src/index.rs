//! Derived read views over stored chunk metadata.
//!
//! Projects and documents are not stored records — they are groupings
//! recovered from chunk metadata by scanning the store. Listings are
//! deduplicated in first-seen (insertion) order and skip empty tags.

use anyhow::Result;

use crate::models::{ChunkEntry, MetadataFilter};
use crate::store::VectorStore;

/// Distinct non-empty project names across all chunks.
pub async fn list_projects(store: &dyn VectorStore) -> Result<Vec<String>> {
    let metas = store.scan(None).await?;
    let mut projects: Vec<String> = Vec::new();
    for meta in metas {
        if !meta.project.is_empty() && !projects.contains(&meta.project) {
            projects.push(meta.project);
        }
    }
    Ok(projects)
}

/// Distinct file names among chunks tagged with `project`, each reported
/// once regardless of chunk count.
pub async fn list_documents(store: &dyn VectorStore, project: &str) -> Result<Vec<String>> {
    let filter = MetadataFilter {
        project: Some(project.to_string()),
        ..Default::default()
    };
    let metas = store.scan(Some(&filter)).await?;
    let mut documents: Vec<String> = Vec::new();
    for meta in metas {
        if !meta.file_name.is_empty() && !documents.contains(&meta.file_name) {
            documents.push(meta.file_name);
        }
    }
    Ok(documents)
}

/// Every chunk of the named document in original chunk order. Empty when
/// the document is unknown — absence is not an error.
pub async fn get_document(store: &dyn VectorStore, file_name: &str) -> Result<Vec<ChunkEntry>> {
    store.fetch_document(file_name).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkMetadata, ChunkRecord};
    use crate::store::memory::InMemoryStore;

    fn record(file_name: &str, project: &str) -> ChunkRecord {
        ChunkRecord {
            id: uuid::Uuid::new_v4().to_string(),
            text: format!("text of {}", file_name),
            embedding: vec![1.0, 0.0],
            metadata: ChunkMetadata {
                file_name: file_name.to_string(),
                file_path: format!("/uploads/{}", file_name),
                project: project.to_string(),
                category: "doc".to_string(),
                description: String::new(),
                ingested_at: "2026-01-01T00:00:00Z".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        let store = InMemoryStore::new();
        assert!(list_projects(&store).await.unwrap().is_empty());
        assert!(list_documents(&store, "p").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn projects_and_documents_are_deduplicated() {
        let store = InMemoryStore::new();
        store
            .add(&[
                record("a.txt", "p1"),
                record("a.txt", "p1"),
                record("b.txt", "p1"),
                record("c.txt", "p2"),
            ])
            .await
            .unwrap();

        let projects = list_projects(&store).await.unwrap();
        assert_eq!(projects, vec!["p1".to_string(), "p2".to_string()]);

        let docs = list_documents(&store, "p1").await.unwrap();
        assert_eq!(docs, vec!["a.txt".to_string(), "b.txt".to_string()]);
    }

    #[tokio::test]
    async fn empty_project_tags_are_skipped() {
        let store = InMemoryStore::new();
        store.add(&[record("a.txt", "")]).await.unwrap();
        assert!(list_projects(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_document_yields_empty_listing() {
        let store = InMemoryStore::new();
        assert!(get_document(&store, "missing.txt").await.unwrap().is_empty());
    }
}
