//! Schema creation for the SQLite backend. Idempotent.

use anyhow::Result;
use sqlx::SqlitePool;

/// Create the chunk table and its secondary indexes if absent.
///
/// Insertion order is the implicit `rowid`; `project` and `file_name`
/// indexes back the scoped listing and delete operations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            file_name TEXT NOT NULL,
            file_path TEXT NOT NULL,
            project TEXT NOT NULL,
            category TEXT NOT NULL,
            description TEXT NOT NULL,
            ingested_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_project ON chunks(project)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_file_name ON chunks(file_name)")
        .execute(pool)
        .await?;

    Ok(())
}
