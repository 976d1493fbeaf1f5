//! The assistant: registration and question answering behind one handle.
//!
//! [`Assistant`] is what a CLI or UI talks to. Registration takes the
//! registry's write lock and queries take its read lock, so documents can be
//! registered while other queries are being answered. [`Assistant::answer`]
//! never fails: every error becomes a readable message in the language of
//! the query.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::create_provider;
use crate::error::{HarnessError, HarnessResult};
use crate::language::{LanguageClassifier, Messages};
use crate::llm::{create_completion_provider, CompletionProvider};
use crate::models::Language;
use crate::names::LlmNameExtractor;
use crate::registry::{Entity, EntityRegistry};
use crate::resolver::{QueryResolver, Resolution};
use crate::store::open_store;

pub struct Assistant {
    registry: RwLock<EntityRegistry>,
    resolver: QueryResolver,
    completion: Arc<dyn CompletionProvider>,
    temperature: f32,
}

impl Assistant {
    pub fn new(
        registry: EntityRegistry,
        resolver: QueryResolver,
        completion: Arc<dyn CompletionProvider>,
        temperature: f32,
    ) -> Self {
        Self {
            registry: RwLock::new(registry),
            resolver,
            completion,
            temperature,
        }
    }

    /// Wire every collaborator from configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = open_store(config).await?;
        let embedder = create_provider(&config.embedding)?;
        let completion = create_completion_provider(&config.llm)?;
        let extractor = Arc::new(LlmNameExtractor::new(
            completion.clone(),
            config.llm.extraction_temperature,
        ));

        info!(
            store = %config.store.kind,
            embedding = %embedder.model_name(),
            llm = %completion.model_name(),
            "assistant ready"
        );

        let registry = EntityRegistry::from_config(config, store, embedder, extractor.clone());
        let resolver =
            QueryResolver::from_config(&config.retrieval, extractor, LanguageClassifier::default());
        Ok(Self::new(registry, resolver, completion, config.llm.temperature))
    }

    pub async fn register_document(
        &self,
        identifier: &str,
        raw_text: &str,
        is_default_candidate: bool,
    ) -> HarnessResult<Entity> {
        let mut registry = self.registry.write().await;
        registry
            .register(identifier, raw_text, is_default_candidate)
            .await
    }

    /// Read access to the registry.
    pub async fn registry(&self) -> RwLockReadGuard<'_, EntityRegistry> {
        self.registry.read().await
    }

    pub fn resolver(&self) -> &QueryResolver {
        &self.resolver
    }

    /// Resolve a query without generating an answer.
    pub async fn resolve(&self, query: &str) -> HarnessResult<Resolution> {
        let registry = self.registry.read().await;
        self.resolver.resolve(&registry, query).await
    }

    /// Answer `query`, or explain in the query's language why not.
    pub async fn answer(&self, query: &str) -> String {
        let language = self.resolver.detect_language(query);
        let messages = Messages::for_language(language);
        match self.try_answer(query, language).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "query failed");
                messages.processing_error(&e)
            }
        }
    }

    async fn try_answer(&self, query: &str, language: Language) -> HarnessResult<String> {
        let resolution = {
            let registry = self.registry.read().await;
            self.resolver
                .resolve_with_language(&registry, query, language)
                .await?
        };

        match resolution {
            Resolution::Prompt(resolved) => self
                .completion
                .complete(&resolved.prompt, self.temperature)
                .await
                .map_err(HarnessError::Generation),
            terminal => Ok(terminal
                .message(&Messages::for_language(language))
                .unwrap_or_default()),
        }
    }
}
