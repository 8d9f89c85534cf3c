//! Core data types for the ingestion and retrieval pipeline.
//!
//! A [`ChunkRecord`] is the atomic stored unit: a bounded text fragment,
//! its embedding vector, and provenance metadata. Documents and projects
//! are not stored separately — they are groupings derived from chunk
//! metadata (all chunks sharing a `file_name` form a document, all
//! documents sharing a `project` tag form a project).

use serde::Serialize;

/// Provenance metadata attached to every chunk of one ingestion.
///
/// All chunks produced by a single ingestion carry identical values,
/// stamped once when the pipeline runs. `ingested_at` is RFC 3339 UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkMetadata {
    pub file_name: String,
    pub file_path: String,
    pub project: String,
    pub category: String,
    pub description: String,
    pub ingested_at: String,
}

/// A stored chunk: text, embedding, and metadata.
///
/// Immutable once written; updating content means delete-then-reingest.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    /// UUIDv4, unique within the store.
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Exact-match filter over chunk metadata. `None` fields match anything;
/// set fields are ANDed together.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub project: Option<String>,
    pub file_name: Option<String>,
    pub category: Option<String>,
}

impl MetadataFilter {
    pub fn matches(&self, meta: &ChunkMetadata) -> bool {
        self.project.as_deref().map_or(true, |p| p == meta.project)
            && self
                .file_name
                .as_deref()
                .map_or(true, |f| f == meta.file_name)
            && self.category.as_deref().map_or(true, |c| c == meta.category)
    }

    pub fn is_empty(&self) -> bool {
        self.project.is_none() && self.file_name.is_none() && self.category.is_none()
    }
}

/// A ranked retrieval result: chunk text, its metadata, and the cosine
/// similarity score against the query vector.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}

/// One chunk of a document as returned by document lookup, in original
/// chunk order. No vector — lookups are metadata/text reads.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkEntry {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Summary returned by a successful ingestion.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub file_name: String,
    /// Extracted segments (slides, sheets, or a single body).
    pub segments: usize,
    pub chunks_written: usize,
    /// Whether a prior generation of this document was deleted first.
    pub replaced_prior: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(project: &str, file_name: &str) -> ChunkMetadata {
        ChunkMetadata {
            file_name: file_name.to_string(),
            file_path: format!("/uploads/{}", file_name),
            project: project.to_string(),
            category: "report".to_string(),
            description: String::new(),
            ingested_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let f = MetadataFilter::default();
        assert!(f.is_empty());
        assert!(f.matches(&meta("p1", "a.txt")));
    }

    #[test]
    fn filter_fields_are_anded() {
        let f = MetadataFilter {
            project: Some("p1".to_string()),
            file_name: Some("a.txt".to_string()),
            category: None,
        };
        assert!(f.matches(&meta("p1", "a.txt")));
        assert!(!f.matches(&meta("p1", "b.txt")));
        assert!(!f.matches(&meta("p2", "a.txt")));
    }
}
