//! Vector storage abstraction for cv-harness.
//!
//! The [`VectorStore`] trait is the only persistence seam in the system:
//! every retrieval namespace writes its embedded chunks through it and
//! searches them back. Namespaces are plain strings; a store must never
//! return records from a namespace other than the one asked for.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::models::{ChunkMetadata, ContentType};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// One embedded chunk as written to a namespace.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    /// Chunk UUID.
    pub id: String,
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 over the embedding model, `text` and metadata.
    pub hash: String,
    pub metadata: ChunkMetadata,
    pub vector: Vec<f32>,
}

/// A chunk returned from similarity search.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub text: String,
    /// Cosine similarity to the query vector; higher is closer.
    pub score: f64,
    pub metadata: ChunkMetadata,
}

/// Abstract vector store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Write a batch of chunks; all or nothing |
/// | [`replace`](VectorStore::replace) | Swap a namespace's contents in one step |
/// | [`hashes`](VectorStore::hashes) | Stored content hashes, in chunk order |
/// | [`search`](VectorStore::search) | Top-`k` chunks by similarity, optionally one content type only |
/// | [`clear`](VectorStore::clear) | Drop every chunk in a namespace |
/// | [`count`](VectorStore::count) | Number of chunks in a namespace |
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, namespace: &str, items: &[StoredChunk]) -> Result<()>;

    /// Delete the namespace and write `items` as one unit. On error the
    /// previous contents are still in place.
    async fn replace(&self, namespace: &str, items: &[StoredChunk]) -> Result<()>;

    async fn hashes(&self, namespace: &str) -> Result<Vec<String>>;

    /// Results are ordered by descending score and hold at most `k` items.
    async fn search(
        &self,
        namespace: &str,
        query_vec: &[f32],
        k: usize,
        content_type: Option<ContentType>,
    ) -> Result<Vec<ScoredChunk>>;

    async fn clear(&self, namespace: &str) -> Result<()>;

    async fn count(&self, namespace: &str) -> Result<usize>;
}

/// Open the store selected by `[store].kind`.
pub async fn open_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    match config.store.kind.as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        "sqlite" => Ok(Arc::new(SqliteStore::open(&config.store.path).await?)),
        other => anyhow::bail!("Unknown store kind: '{}'", other),
    }
}

/// Order by descending score and keep the top `k`.
pub(crate) fn rank(mut candidates: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(k);
    candidates
}
