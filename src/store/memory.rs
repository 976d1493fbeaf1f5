//! In-memory [`VectorStore`] implementation.
//!
//! Uses a `HashMap` of namespace → records behind `std::sync::RwLock`.
//! Search is brute-force cosine similarity over the namespace.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::ContentType;

use super::{rank, ScoredChunk, StoredChunk, VectorStore};

/// In-memory store for tests and single-process runs.
pub struct InMemoryStore {
    namespaces: RwLock<HashMap<String, Vec<StoredChunk>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert(&self, namespace: &str, items: &[StoredChunk]) -> Result<()> {
        let mut namespaces = self
            .namespaces
            .write()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        let records = namespaces.entry(namespace.to_string()).or_default();
        for item in items {
            records.retain(|r| r.id != item.id);
            records.push(item.clone());
        }
        Ok(())
    }

    async fn replace(&self, namespace: &str, items: &[StoredChunk]) -> Result<()> {
        let mut namespaces = self
            .namespaces
            .write()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        if items.is_empty() {
            namespaces.remove(namespace);
        } else {
            namespaces.insert(namespace.to_string(), items.to_vec());
        }
        Ok(())
    }

    async fn hashes(&self, namespace: &str) -> Result<Vec<String>> {
        let namespaces = self
            .namespaces
            .read()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        let mut records: Vec<&StoredChunk> =
            namespaces.get(namespace).map(|r| r.iter().collect()).unwrap_or_default();
        records.sort_by_key(|r| r.chunk_index);
        Ok(records.into_iter().map(|r| r.hash.clone()).collect())
    }

    async fn search(
        &self,
        namespace: &str,
        query_vec: &[f32],
        k: usize,
        content_type: Option<ContentType>,
    ) -> Result<Vec<ScoredChunk>> {
        let namespaces = self
            .namespaces
            .read()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        let Some(records) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };
        let candidates = records
            .iter()
            .filter(|r| content_type.map_or(true, |ct| r.metadata.content_type == ct))
            .map(|r| ScoredChunk {
                chunk_id: r.id.clone(),
                text: r.text.clone(),
                score: cosine_similarity(query_vec, &r.vector) as f64,
                metadata: r.metadata.clone(),
            })
            .collect();
        Ok(rank(candidates, k))
    }

    async fn clear(&self, namespace: &str) -> Result<()> {
        let mut namespaces = self
            .namespaces
            .write()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        namespaces.remove(namespace);
        Ok(())
    }

    async fn count(&self, namespace: &str) -> Result<usize> {
        let namespaces = self
            .namespaces
            .read()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(namespaces.get(namespace).map_or(0, |r| r.len()))
    }
}
