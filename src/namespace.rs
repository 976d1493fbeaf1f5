//! Retrieval namespaces: one isolated, embedded chunk collection per entity.
//!
//! A namespace owns nothing but its name; vectors live in the shared
//! [`VectorStore`] and are produced by the shared [`EmbeddingProvider`].
//! Both are injected so a registry can hand every entity the same backend.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::{HarnessError, HarnessResult};
use crate::models::{Chunk, ChunkMetadata, ContentType, QueryResultItem};
use crate::store::{StoredChunk, VectorStore};

/// Namespace name for an entity identifier: `cv_<lowercased identifier>`.
pub fn namespace_for(identifier: &str) -> String {
    format!("cv_{}", identifier.trim().to_lowercase())
}

#[derive(Clone)]
pub struct RetrievalNamespace {
    name: String,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for RetrievalNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalNamespace")
            .field("name", &self.name)
            .field("embedder", &self.embedder.model_name())
            .finish()
    }
}

impl RetrievalNamespace {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            embedder,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Embed and persist `chunks`, pairing each with the metadata at the same
    /// position. The batch is written in one store call; any failure is a
    /// [`HarnessError::Storage`] and nothing is reported as stored.
    pub async fn add(&self, chunks: &[Chunk], metadatas: &[ChunkMetadata]) -> HarnessResult<usize> {
        let items = self.embed_items(chunks, metadatas).await?;
        if items.is_empty() {
            return Ok(0);
        }
        self.store
            .upsert(&self.name, &items)
            .await
            .map_err(|e| HarnessError::storage(&self.name, e))?;

        debug!(namespace = %self.name, chunks = items.len(), "stored chunks");
        Ok(items.len())
    }

    /// Make `chunks` the whole content of the namespace.
    ///
    /// Vectors are computed before anything stored is touched, and the
    /// store swaps the namespace in one step, so a failure leaves the
    /// previous chunks searchable. When the stored content hashes already
    /// match, nothing is embedded or written.
    pub async fn replace(
        &self,
        chunks: &[Chunk],
        metadatas: &[ChunkMetadata],
    ) -> HarnessResult<usize> {
        self.check_lengths(chunks, metadatas)?;
        let hashes: Vec<String> = chunks
            .iter()
            .zip(metadatas)
            .map(|(chunk, metadata)| self.chunk_hash(&chunk.text, metadata))
            .collect();
        let stored = self
            .store
            .hashes(&self.name)
            .await
            .map_err(|e| HarnessError::storage(&self.name, e))?;
        if !hashes.is_empty() && stored == hashes {
            debug!(namespace = %self.name, chunks = hashes.len(), "content unchanged, keeping stored vectors");
            return Ok(hashes.len());
        }

        let items = self.embed_items(chunks, metadatas).await?;
        self.store
            .replace(&self.name, &items)
            .await
            .map_err(|e| HarnessError::storage(&self.name, e))?;

        debug!(namespace = %self.name, chunks = items.len(), "replaced chunks");
        Ok(items.len())
    }

    fn check_lengths(&self, chunks: &[Chunk], metadatas: &[ChunkMetadata]) -> HarnessResult<()> {
        if chunks.len() != metadatas.len() {
            return Err(HarnessError::storage(
                &self.name,
                anyhow::anyhow!(
                    "{} chunks but {} metadata entries",
                    chunks.len(),
                    metadatas.len()
                ),
            ));
        }
        Ok(())
    }

    /// SHA-256 over the embedding model, the text and the metadata.
    fn chunk_hash(&self, text: &str, metadata: &ChunkMetadata) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.embedder.model_name().as_bytes());
        hasher.update(self.embedder.dims().to_le_bytes());
        for part in [
            text,
            metadata.cv_name.as_str(),
            metadata.section.as_str(),
            metadata.content_type.as_str(),
        ] {
            hasher.update([0u8]);
            hasher.update(part.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    async fn embed_items(
        &self,
        chunks: &[Chunk],
        metadatas: &[ChunkMetadata],
    ) -> HarnessResult<Vec<StoredChunk>> {
        self.check_lengths(chunks, metadatas)?;
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .map_err(|e| HarnessError::storage(&self.name, e))?;
        if vectors.len() != chunks.len() {
            return Err(HarnessError::storage(
                &self.name,
                anyhow::anyhow!(
                    "embedding provider returned {} vectors for {} chunks",
                    vectors.len(),
                    chunks.len()
                ),
            ));
        }

        Ok(chunks
            .iter()
            .zip(metadatas)
            .zip(vectors)
            .map(|((chunk, metadata), vector)| StoredChunk {
                id: uuid::Uuid::new_v4().to_string(),
                chunk_index: chunk.index as i64,
                text: chunk.text.clone(),
                hash: self.chunk_hash(&chunk.text, metadata),
                metadata: metadata.clone(),
                vector,
            })
            .collect())
    }

    /// Top-`k` chunks for `query`, most similar first.
    ///
    /// When `content_type` is given and matches nothing, the search is
    /// repeated once without it.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        content_type: Option<ContentType>,
    ) -> HarnessResult<Vec<QueryResultItem>> {
        let query_vec = embed_query(self.embedder.as_ref(), query)
            .await
            .map_err(|e| HarnessError::retrieval(&self.name, e))?;

        let mut hits = self
            .store
            .search(&self.name, &query_vec, k, content_type)
            .await
            .map_err(|e| HarnessError::retrieval(&self.name, e))?;

        if hits.is_empty() {
            if let Some(ct) = content_type {
                debug!(namespace = %self.name, filter = %ct, "filter matched nothing, retrying unfiltered");
                hits = self
                    .store
                    .search(&self.name, &query_vec, k, None)
                    .await
                    .map_err(|e| HarnessError::retrieval(&self.name, e))?;
            }
        }

        Ok(hits
            .into_iter()
            .map(|hit| QueryResultItem {
                text: hit.text,
                similarity_score: hit.score,
                section: hit.metadata.section,
                content_type: hit.metadata.content_type,
                namespace: self.name.clone(),
            })
            .collect())
    }

    pub async fn count(&self) -> HarnessResult<usize> {
        self.store
            .count(&self.name)
            .await
            .map_err(|e| HarnessError::retrieval(&self.name, e))
    }
}
