//! Entity registry: the people whose CVs have been ingested.
//!
//! The registry owns three things:
//!
//! - one [`Entity`] per canonical id, each bound to its own
//!   [`RetrievalNamespace`] at registration time;
//! - the [`AliasTable`] mapping name fragments to canonical ids;
//! - the default entity, answered for when a query names nobody.
//!
//! # Aliases
//!
//! For an entity `ana_garcia` named "Ana García López" the table gains every
//! single token (`ana`, `garcia`, `lopez`), every adjacent pair
//! (`ana garcia`, `garcia lopez`), the full name and the identifier itself.
//! Keys are accent-folded and lowercased.
//!
//! Aliases are last-write-wins: if a later entity derives a fragment another
//! entity already owns (a shared surname, say), the fragment moves to the
//! later entity. Re-registering an identifier first drops every fragment it
//! owned, then derives them again from the new display name.
//!
//! # Default entity
//!
//! Registering the configured override id always makes it the default,
//! replacing any earlier one. Otherwise a registration flagged as a default
//! candidate becomes the default only while there is none.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chunk::{segment_with_threshold, FLUSH_THRESHOLD};
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::{HarnessError, HarnessResult};
use crate::models::ChunkMetadata;
use crate::names::{document_prefix, NameExtractor};
use crate::namespace::{namespace_for, RetrievalNamespace};
use crate::normalize::normalize_name;
use crate::store::VectorStore;

/// Default number of leading characters handed to display-name extraction.
pub const DEFAULT_NAME_PREFIX_CHARS: usize = 1000;

// ═══════════════════════════════════════════════════════════════════════
// Alias table
// ═══════════════════════════════════════════════════════════════════════

/// Name fragment → canonical id.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    map: HashMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `alias` to `canonical_id`, returning the id it previously mapped
    /// to when that was a different entity.
    pub fn insert(&mut self, alias: &str, canonical_id: &str) -> Option<String> {
        let key = normalize_name(alias);
        if key.is_empty() {
            return None;
        }
        match self.map.insert(key, canonical_id.to_string()) {
            Some(previous) if previous != canonical_id => Some(previous),
            _ => None,
        }
    }

    pub fn resolve(&self, token: &str) -> Option<&str> {
        self.map.get(&normalize_name(token)).map(String::as_str)
    }

    /// Every alias currently resolving to `canonical_id`, sorted.
    pub fn aliases_for(&self, canonical_id: &str) -> Vec<String> {
        let mut aliases: Vec<String> = self
            .map
            .iter()
            .filter(|(_, id)| id.as_str() == canonical_id)
            .map(|(alias, _)| alias.clone())
            .collect();
        aliases.sort();
        aliases
    }

    pub fn remove_owned_by(&mut self, canonical_id: &str) {
        self.map.retain(|_, id| id != canonical_id);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Alias fragments for an entity, in insertion order without repeats.
///
/// Underscores in the display name count as spaces, so an identifier used
/// as a fallback display name (`john_doe`) still yields `john` and `doe`.
pub fn derive_aliases(identifier: &str, display_name: &str) -> Vec<String> {
    let full = normalize_name(&display_name.replace('_', " "));
    let parts: Vec<&str> = full.split_whitespace().collect();

    let mut out: Vec<String> = Vec::new();
    let mut push = |alias: String| {
        if !alias.is_empty() && !out.contains(&alias) {
            out.push(alias);
        }
    };

    for part in &parts {
        push(part.to_string());
    }
    for pair in parts.windows(2) {
        push(pair.join(" "));
    }
    push(full.clone());
    push(normalize_name(identifier));
    if parts.len() > 2 {
        push(parts[parts.len() - 2..].join(" "));
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════
// Entities
// ═══════════════════════════════════════════════════════════════════════

/// A person whose CV has been registered.
#[derive(Debug, Clone)]
pub struct Entity {
    /// Lowercased identifier, usually the document's file stem.
    pub canonical_id: String,
    pub display_name: String,
    pub namespace: RetrievalNamespace,
    pub chunk_count: usize,
    pub registered_at: DateTime<Utc>,
}

pub struct EntityRegistry {
    default_override_id: String,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: Arc<dyn NameExtractor>,
    flush_chars: usize,
    name_prefix_chars: usize,
    entities: HashMap<String, Entity>,
    /// Canonical ids in first-registration order.
    order: Vec<String>,
    aliases: AliasTable,
    default_id: Option<String>,
}

impl EntityRegistry {
    pub fn new(
        default_override_id: impl Into<String>,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn NameExtractor>,
    ) -> Self {
        Self {
            default_override_id: default_override_id.into().trim().to_lowercase(),
            store,
            embedder,
            extractor,
            flush_chars: FLUSH_THRESHOLD,
            name_prefix_chars: DEFAULT_NAME_PREFIX_CHARS,
            entities: HashMap::new(),
            order: Vec::new(),
            aliases: AliasTable::new(),
            default_id: None,
        }
    }

    /// Registry configured from `[entities]` and `[chunking]`.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn NameExtractor>,
    ) -> Self {
        Self::new(
            config.entities.default_override_id.clone(),
            store,
            embedder,
            extractor,
        )
        .with_flush_chars(config.chunking.flush_chars)
        .with_name_prefix_chars(config.entities.name_prefix_chars)
    }

    pub fn with_flush_chars(mut self, flush_chars: usize) -> Self {
        self.flush_chars = flush_chars.max(1);
        self
    }

    pub fn with_name_prefix_chars(mut self, chars: usize) -> Self {
        self.name_prefix_chars = chars;
        self
    }

    /// Register (or re-register) the document for `identifier`.
    ///
    /// The namespace contents are replaced before the entity, its aliases
    /// or the default are touched. On [`HarnessError::Storage`] both the
    /// registry and the previously stored chunks are left as they were.
    pub async fn register(
        &mut self,
        identifier: &str,
        document_text: &str,
        is_default_candidate: bool,
    ) -> HarnessResult<Entity> {
        let canonical_id = identifier.trim().to_lowercase();
        if canonical_id.is_empty() {
            return Err(HarnessError::InvalidIdentifier(identifier.to_string()));
        }

        let display_name = self.display_name_for(identifier.trim(), document_text).await;

        let chunks = segment_with_threshold(document_text, self.flush_chars);
        let metadatas: Vec<ChunkMetadata> = chunks
            .iter()
            .map(|c| ChunkMetadata {
                cv_name: display_name.clone(),
                section: c.section,
                content_type: c.content_type,
            })
            .collect();

        let namespace = RetrievalNamespace::new(
            namespace_for(&canonical_id),
            self.store.clone(),
            self.embedder.clone(),
        );
        let chunk_count = namespace.replace(&chunks, &metadatas).await?;
        info!(
            id = %canonical_id,
            name = %display_name,
            namespace = %namespace.name(),
            chunks = chunk_count,
            "registered entity"
        );

        self.aliases.remove_owned_by(&canonical_id);
        for alias in derive_aliases(&canonical_id, &display_name) {
            if let Some(previous) = self.aliases.insert(&alias, &canonical_id) {
                warn!(alias = %alias, from = %previous, to = %canonical_id, "alias reassigned");
            }
        }
        debug!(id = %canonical_id, aliases = ?self.aliases.aliases_for(&canonical_id), "alias table updated");

        let entity = Entity {
            canonical_id: canonical_id.clone(),
            display_name,
            namespace,
            chunk_count,
            registered_at: Utc::now(),
        };
        if self.entities.insert(canonical_id.clone(), entity.clone()).is_none() {
            self.order.push(canonical_id.clone());
        }

        if canonical_id == self.default_override_id
            || (is_default_candidate && self.default_id.is_none())
        {
            info!(id = %canonical_id, "default entity set");
            self.default_id = Some(canonical_id);
        }

        Ok(entity)
    }

    async fn display_name_for(&self, identifier: &str, document_text: &str) -> String {
        let prefix = document_prefix(document_text, self.name_prefix_chars);
        match self.extractor.extract_display_name(prefix).await {
            Ok(Some(name)) => name,
            Ok(None) => {
                debug!(id = %identifier, "no name found in document, using identifier");
                identifier.to_string()
            }
            Err(e) => {
                let err = HarnessError::Extraction(e.to_string());
                warn!(id = %identifier, error = %err, "using identifier as display name");
                identifier.to_string()
            }
        }
    }

    pub fn lookup(&self, identifier: &str) -> Option<&Entity> {
        self.entities.get(&identifier.trim().to_lowercase())
    }

    pub fn resolve_alias(&self, token: &str) -> Option<&str> {
        self.aliases.resolve(token)
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn default_entity(&self) -> Option<&Entity> {
        self.default_id.as_ref().and_then(|id| self.entities.get(id))
    }

    pub fn is_default(&self, canonical_id: &str) -> bool {
        self.default_id.as_deref() == Some(canonical_id)
    }

    /// Entities in first-registration order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.order.iter().filter_map(|id| self.entities.get(id))
    }

    /// Display name and aliases of every entity, for the mention prompt.
    pub fn known_names(&self) -> Vec<(String, Vec<String>)> {
        self.entities()
            .map(|e| (e.display_name.clone(), self.aliases.aliases_for(&e.canonical_id)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
