//! SQLite-backed [`VectorStore`] implementation.
//!
//! One row per chunk in `cv_chunks`, keyed by chunk UUID and indexed by
//! namespace. Embeddings are little-endian f32 BLOBs; similarity is
//! computed in process over the rows of a single namespace.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::path::Path;

use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::migrate;
use crate::models::{ChunkMetadata, ContentType};

use super::{rank, ScoredChunk, StoredChunk, VectorStore};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to (creating if needed) the database at `path` and migrate it.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path)
            .await
            .with_context(|| format!("Failed to open SQLite store: {}", path.display()))?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn insert_chunk(
    conn: &mut SqliteConnection,
    namespace: &str,
    item: &StoredChunk,
) -> Result<()> {
    let metadata_json = serde_json::to_string(&item.metadata)?;
    sqlx::query(
        r#"
        INSERT INTO cv_chunks (id, namespace, chunk_index, text, hash, section,
                               content_type, metadata_json, embedding)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            namespace = excluded.namespace,
            chunk_index = excluded.chunk_index,
            text = excluded.text,
            hash = excluded.hash,
            section = excluded.section,
            content_type = excluded.content_type,
            metadata_json = excluded.metadata_json,
            embedding = excluded.embedding
        "#,
    )
    .bind(&item.id)
    .bind(namespace)
    .bind(item.chunk_index)
    .bind(&item.text)
    .bind(&item.hash)
    .bind(item.metadata.section.as_str())
    .bind(item.metadata.content_type.as_str())
    .bind(&metadata_json)
    .bind(vec_to_blob(&item.vector))
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn upsert(&self, namespace: &str, items: &[StoredChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for item in items {
            insert_chunk(&mut tx, namespace, item).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn replace(&self, namespace: &str, items: &[StoredChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM cv_chunks WHERE namespace = ?")
            .bind(namespace)
            .execute(&mut *tx)
            .await?;
        for item in items {
            insert_chunk(&mut tx, namespace, item).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn hashes(&self, namespace: &str) -> Result<Vec<String>> {
        let hashes: Vec<String> = sqlx::query_scalar(
            "SELECT hash FROM cv_chunks WHERE namespace = ? ORDER BY chunk_index",
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await?;
        Ok(hashes)
    }

    async fn search(
        &self,
        namespace: &str,
        query_vec: &[f32],
        k: usize,
        content_type: Option<ContentType>,
    ) -> Result<Vec<ScoredChunk>> {
        let rows = match content_type {
            Some(ct) => {
                sqlx::query(
                    "SELECT id, text, metadata_json, embedding FROM cv_chunks WHERE namespace = ? AND content_type = ?",
                )
                .bind(namespace)
                .bind(ct.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, text, metadata_json, embedding FROM cv_chunks WHERE namespace = ?",
                )
                .bind(namespace)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let metadata_json: String = row.get("metadata_json");
            let metadata: ChunkMetadata = serde_json::from_str(&metadata_json)
                .context("Corrupt chunk metadata in SQLite store")?;
            candidates.push(ScoredChunk {
                chunk_id: row.get("id"),
                text: row.get("text"),
                score: cosine_similarity(query_vec, &blob_to_vec(&blob)) as f64,
                metadata,
            });
        }

        Ok(rank(candidates, k))
    }

    async fn clear(&self, namespace: &str) -> Result<()> {
        sqlx::query("DELETE FROM cv_chunks WHERE namespace = ?")
            .bind(namespace)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count(&self, namespace: &str) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cv_chunks WHERE namespace = ?")
            .bind(namespace)
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Section;
    use tempfile::TempDir;

    fn record(id: &str, vector: Vec<f32>, content_type: ContentType) -> StoredChunk {
        StoredChunk {
            id: id.to_string(),
            chunk_index: 0,
            text: format!("text {}", id),
            hash: format!("h-{}", id),
            metadata: ChunkMetadata {
                cv_name: "Carlos Rodríguez".to_string(),
                section: Section::Skills,
                content_type,
            },
            vector,
        }
    }

    #[tokio::test]
    async fn test_roundtrip_search_and_filter() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("data").join("cvh.sqlite"))
            .await
            .unwrap();
        store
            .upsert(
                "cv_carlos",
                &[
                    record("a", vec![1.0, 0.0], ContentType::Technologies),
                    record("b", vec![0.6, 0.8], ContentType::Leadership),
                ],
            )
            .await
            .unwrap();
        store
            .upsert("cv_ana", &[record("z", vec![1.0, 0.0], ContentType::Technologies)])
            .await
            .unwrap();

        let hits = store.search("cv_carlos", &[1.0, 0.0], 5, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, "a");
        assert_eq!(hits[0].metadata.cv_name, "Carlos Rodríguez");
        assert_eq!(hits[0].metadata.section, Section::Skills);

        let hits = store
            .search("cv_carlos", &[1.0, 0.0], 5, Some(ContentType::Leadership))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "b");

        assert_eq!(store.count("cv_carlos").await.unwrap(), 2);
        store.clear("cv_carlos").await.unwrap();
        assert_eq!(store.count("cv_carlos").await.unwrap(), 0);
        assert_eq!(store.count("cv_ana").await.unwrap(), 1);
        store.close().await;
    }

    #[tokio::test]
    async fn test_reopen_keeps_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cvh.sqlite");
        {
            let store = SqliteStore::open(&path).await.unwrap();
            store
                .upsert("ns", &[record("a", vec![1.0], ContentType::General)])
                .await
                .unwrap();
            store.close().await;
        }
        let store = SqliteStore::open(&path).await.unwrap();
        assert_eq!(store.count("ns").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replace_is_one_transaction() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("cvh.sqlite")).await.unwrap();
        store
            .upsert("cv_carlos", &[record("old", vec![1.0], ContentType::General)])
            .await
            .unwrap();

        let mut second = record("b", vec![1.0], ContentType::General);
        second.chunk_index = 1;
        store
            .replace(
                "cv_carlos",
                &[second, record("a", vec![1.0], ContentType::General)],
            )
            .await
            .unwrap();
        assert_eq!(store.hashes("cv_carlos").await.unwrap(), vec!["h-a", "h-b"]);

        sqlx::query(
            "CREATE TRIGGER reject_boom BEFORE INSERT ON cv_chunks WHEN NEW.text = 'text boom' \
             BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(&store.pool)
        .await
        .unwrap();
        let err = store
            .replace(
                "cv_carlos",
                &[
                    record("c", vec![1.0], ContentType::General),
                    record("boom", vec![1.0], ContentType::General),
                ],
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rejected"));
        assert_eq!(store.hashes("cv_carlos").await.unwrap(), vec!["h-a", "h-b"]);
        store.close().await;
    }
}
