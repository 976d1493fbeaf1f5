use anyhow::Result;
use sqlx::SqlitePool;

/// Create the chunk table and its indexes. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cv_chunks (
            id TEXT PRIMARY KEY,
            namespace TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            section TEXT NOT NULL,
            content_type TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cv_chunks_namespace ON cv_chunks(namespace)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_cv_chunks_namespace_type ON cv_chunks(namespace, content_type)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
