//! SQLite [`VectorStore`] backend.
//!
//! One `chunks` table holds text, the embedding as a little-endian f32
//! BLOB, and the metadata columns. Insertion order is `rowid`. Each
//! write batch (`add` or `replace`) runs in one immediate transaction
//! covering the dimensionality check, any replace-delete, and the
//! inserts, so all chunks of one ingestion become visible together or
//! not at all and racing writers serialize against the check.
//! Similarity search fetches
//! every candidate row and computes cosine similarity in Rust; there is
//! no approximate index.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::config::StoreConfig;
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::migrate;
use crate::models::{ChunkEntry, ChunkMetadata, ChunkRecord, MetadataFilter, ScoredChunk};

use super::{check_batch_dims, rank_candidates, VectorStore};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to the configured database and ensure the schema exists.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let pool = crate::db::connect(config).await?;
        migrate::run_migrations(&pool)
            .await
            .context("failed to initialize chunk table")?;
        Ok(Self { pool })
    }

    /// Run the dimension check, optional replace-delete, and inserts as
    /// one immediate transaction. Taking the write lock before the check
    /// serializes it against concurrent appends, so two racing first
    /// ingests cannot both pass and leave the store mixed-dimensional.
    async fn write_batch(
        &self,
        records: &[ChunkRecord],
        replace_file_name: Option<&str>,
    ) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .context("failed to open store transaction")?;
        match insert_batch(&mut conn, records, replace_file_name).await {
            Ok(deleted) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .context("failed to commit chunk batch")?;
                Ok(deleted)
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }
}

/// Check dimensionality, delete the replaced document if any, and insert
/// the batch. Must run inside an already-open write transaction.
async fn insert_batch(
    conn: &mut sqlx::pool::PoolConnection<sqlx::Sqlite>,
    records: &[ChunkRecord],
    replace_file_name: Option<&str>,
) -> Result<u64> {
    // Existing dimensionality, ignoring rows the replace is about to
    // remove so that replacing the sole document may change models.
    let existing: Option<i64> = match replace_file_name {
        Some(name) => {
            sqlx::query_scalar("SELECT length(embedding) FROM chunks WHERE file_name != ? LIMIT 1")
                .bind(name)
                .fetch_optional(&mut **conn)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT length(embedding) FROM chunks LIMIT 1")
                .fetch_optional(&mut **conn)
                .await?
        }
    };
    check_batch_dims(records, existing.map(|bytes| bytes as usize / 4))?;

    let mut deleted = 0;
    if let Some(name) = replace_file_name {
        deleted = sqlx::query("DELETE FROM chunks WHERE file_name = ?")
            .bind(name)
            .execute(&mut **conn)
            .await?
            .rows_affected();
    }

    for record in records {
        sqlx::query(
            r#"
            INSERT INTO chunks (id, text, embedding, file_name, file_path, project, category, description, ingested_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.text)
        .bind(vec_to_blob(&record.embedding))
        .bind(&record.metadata.file_name)
        .bind(&record.metadata.file_path)
        .bind(&record.metadata.project)
        .bind(&record.metadata.category)
        .bind(&record.metadata.description)
        .bind(&record.metadata.ingested_at)
        .execute(&mut **conn)
        .await?;
    }
    Ok(deleted)
}

fn row_metadata(row: &sqlx::sqlite::SqliteRow) -> ChunkMetadata {
    ChunkMetadata {
        file_name: row.get("file_name"),
        file_path: row.get("file_path"),
        project: row.get("project"),
        category: row.get("category"),
        description: row.get("description"),
        ingested_at: row.get("ingested_at"),
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn add(&self, records: &[ChunkRecord]) -> Result<()> {
        self.write_batch(records, None).await?;
        Ok(())
    }

    async fn replace(&self, file_name: &str, records: &[ChunkRecord]) -> Result<bool> {
        Ok(self.write_batch(records, Some(file_name)).await? > 0)
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT text, embedding, file_name, file_path, project, category, description, ingested_at
            FROM chunks ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let candidates: Vec<(ChunkMetadata, String, Vec<f32>)> = rows
            .iter()
            .filter_map(|row| {
                let metadata = row_metadata(row);
                if let Some(f) = filter {
                    if !f.matches(&metadata) {
                        return None;
                    }
                }
                let blob: Vec<u8> = row.get("embedding");
                Some((metadata, row.get("text"), blob_to_vec(&blob)))
            })
            .collect();

        Ok(rank_candidates(query, candidates, k))
    }

    async fn scan(&self, filter: Option<&MetadataFilter>) -> Result<Vec<ChunkMetadata>> {
        let rows = sqlx::query(
            r#"
            SELECT file_name, file_path, project, category, description, ingested_at
            FROM chunks ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(row_metadata)
            .filter(|meta| filter.map_or(true, |f| f.matches(meta)))
            .collect())
    }

    async fn fetch_document(&self, file_name: &str) -> Result<Vec<ChunkEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT text, file_name, file_path, project, category, description, ingested_at
            FROM chunks WHERE file_name = ? ORDER BY rowid
            "#,
        )
        .bind(file_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ChunkEntry {
                text: row.get("text"),
                metadata: row_metadata(row),
            })
            .collect())
    }

    async fn delete_by_file_name(&self, file_name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM chunks WHERE file_name = ?")
            .bind(file_name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
