//! Query resolution: who is the query about, and what prompt answers it.
//!
//! ```text
//! query ──▶ mention extraction ──▶ alias table ──▶ [ids]
//!                                                   │
//!        ┌──────────────────┬───────────────────────┼────────────────────┐
//!        ▼                  ▼                       ▼                    ▼
//!   [] + default       [] + no default         [one id]            [many ids]
//!   default prompt     NoDefault               named prompt        concatenated
//!                                              or NotFound         prompt or NoneFound
//! ```
//!
//! Mention extraction is best effort: a failed call or an unusable answer
//! means "nobody mentioned". Retrieval failures are errors.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chunk::infer_query_type;
use crate::config::RetrievalConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::language::{get_response_template, render_template, LanguageClassifier, Messages};
use crate::models::{ContentType, Language, QueryResultItem};
use crate::names::{mention_prompt, parse_mentions, NameExtractor};
use crate::registry::{Entity, EntityRegistry};

/// Default number of chunks retrieved per namespace.
pub const DEFAULT_TOP_K: usize = 3;

/// A prompt ready for generation.
#[derive(Debug, Clone)]
pub struct ResolvedPrompt {
    pub prompt: String,
    /// Canonical ids of the entities whose namespaces were searched, in match order.
    pub entities: Vec<String>,
    /// `None` when the default entity answered an unnamed query.
    pub subject: Option<String>,
    pub context: Vec<QueryResultItem>,
    pub language: Language,
}

/// Outcome of resolving a query.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Nobody was mentioned and there is no default entity.
    NoDefault,
    /// One person was mentioned but is not registered.
    NotFound(String),
    /// Several people were mentioned and none is registered.
    NoneFound,
    Prompt(ResolvedPrompt),
}

impl Resolution {
    /// User-facing text for the terminal outcomes.
    pub fn message(&self, messages: &Messages) -> Option<String> {
        match self {
            Resolution::NoDefault => Some(messages.no_default()),
            Resolution::NotFound(name) => Some(messages.cv_not_found(name)),
            Resolution::NoneFound => Some(messages.no_cvs_found()),
            Resolution::Prompt(_) => None,
        }
    }
}

pub struct QueryResolver {
    extractor: Arc<dyn NameExtractor>,
    classifier: LanguageClassifier,
    top_k: usize,
    filter_by_query_type: bool,
}

impl QueryResolver {
    pub fn new(extractor: Arc<dyn NameExtractor>, classifier: LanguageClassifier) -> Self {
        Self {
            extractor,
            classifier,
            top_k: DEFAULT_TOP_K,
            filter_by_query_type: false,
        }
    }

    pub fn from_config(
        config: &RetrievalConfig,
        extractor: Arc<dyn NameExtractor>,
        classifier: LanguageClassifier,
    ) -> Self {
        Self::new(extractor, classifier)
            .with_top_k(config.top_k)
            .with_query_type_filter(config.filter_by_query_type)
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k.max(1);
        self
    }

    pub fn with_query_type_filter(mut self, enabled: bool) -> Self {
        self.filter_by_query_type = enabled;
        self
    }

    pub fn detect_language(&self, query: &str) -> Language {
        self.classifier.detect_language(query)
    }

    /// Canonical ids mentioned in `query`, in the order the model named them.
    pub async fn mentioned_entities(&self, registry: &EntityRegistry, query: &str) -> Vec<String> {
        if registry.is_empty() {
            return Vec::new();
        }
        let prompt = mention_prompt(&registry.known_names(), query);
        match self.extractor.extract_mentioned_names(&prompt).await {
            Ok(raw) => {
                let ids = parse_mentions(&raw, registry.aliases());
                debug!(raw = %raw.trim(), ids = ?ids, "mentions extracted");
                ids
            }
            Err(e) => {
                let err = HarnessError::Extraction(e.to_string());
                warn!(error = %err, "treating query as unnamed");
                Vec::new()
            }
        }
    }

    pub async fn resolve(&self, registry: &EntityRegistry, query: &str) -> HarnessResult<Resolution> {
        let language = self.detect_language(query);
        self.resolve_with_language(registry, query, language).await
    }

    pub async fn resolve_with_language(
        &self,
        registry: &EntityRegistry,
        query: &str,
        language: Language,
    ) -> HarnessResult<Resolution> {
        let mentioned = self.mentioned_entities(registry, query).await;
        let filter = self.query_filter(query);

        match mentioned.as_slice() {
            [] => {
                let Some(entity) = registry.default_entity() else {
                    info!("no mention and no default entity");
                    return Ok(Resolution::NoDefault);
                };
                info!(id = %entity.canonical_id, "answering with default entity");
                let context = self.retrieve(entity, query, filter).await?;
                Ok(Resolution::Prompt(ResolvedPrompt {
                    prompt: assemble_prompt(language, None, &context, query),
                    entities: vec![entity.canonical_id.clone()],
                    subject: None,
                    context,
                    language,
                }))
            }
            [id] => {
                let Some(entity) = registry.lookup(id) else {
                    warn!(id = %id, "mentioned entity is not registered");
                    return Ok(Resolution::NotFound(id.clone()));
                };
                info!(id = %entity.canonical_id, "answering for one entity");
                let context = self.retrieve(entity, query, filter).await?;
                Ok(Resolution::Prompt(ResolvedPrompt {
                    prompt: assemble_prompt(
                        language,
                        Some(&entity.display_name),
                        &context,
                        query,
                    ),
                    entities: vec![entity.canonical_id.clone()],
                    subject: Some(entity.display_name.clone()),
                    context,
                    language,
                }))
            }
            ids => {
                let mut context = Vec::new();
                let mut entities = Vec::new();
                let mut names = Vec::new();
                for id in ids {
                    let Some(entity) = registry.lookup(id) else {
                        debug!(id = %id, "dropping unregistered mention");
                        continue;
                    };
                    context.extend(self.retrieve(entity, query, filter).await?);
                    entities.push(entity.canonical_id.clone());
                    names.push(entity.display_name.clone());
                }
                if entities.is_empty() {
                    return Ok(Resolution::NoneFound);
                }
                info!(ids = ?entities, "answering for several entities");
                let subject = names.join(", ");
                Ok(Resolution::Prompt(ResolvedPrompt {
                    prompt: assemble_prompt(language, Some(&subject), &context, query),
                    entities,
                    subject: Some(subject),
                    context,
                    language,
                }))
            }
        }
    }

    fn query_filter(&self, query: &str) -> Option<ContentType> {
        if self.filter_by_query_type {
            infer_query_type(query)
        } else {
            None
        }
    }

    async fn retrieve(
        &self,
        entity: &Entity,
        query: &str,
        filter: Option<ContentType>,
    ) -> HarnessResult<Vec<QueryResultItem>> {
        entity.namespace.search(query, self.top_k, filter).await
    }
}

/// Retrieved texts as a bulleted list, in retrieval order.
pub fn build_context(items: &[QueryResultItem]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the template for `language`. `subject` is `None` for the default entity.
pub fn assemble_prompt(
    language: Language,
    subject: Option<&str>,
    items: &[QueryResultItem],
    query: &str,
) -> String {
    let template = get_response_template(language.code(), subject.is_none());
    render_template(template.template, subject, &build_context(items), query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Section;

    fn item(text: &str) -> QueryResultItem {
        QueryResultItem {
            text: text.to_string(),
            similarity_score: 0.5,
            section: Section::General,
            content_type: ContentType::General,
            namespace: "cv_x".to_string(),
        }
    }

    #[test]
    fn test_build_context_bullets_in_order() {
        assert_eq!(build_context(&[item("b"), item("a")]), "- b\n- a");
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_assemble_prompt_named_and_default() {
        let named = assemble_prompt(Language::En, Some("Ana García"), &[item("Rust")], "Skills?");
        assert!(named.contains("Ana García's CV"));
        assert!(named.contains("- Rust"));
        assert!(named.contains("Question: Skills?"));

        let default = assemble_prompt(Language::Es, None, &[item("Rust")], "¿Habilidades?");
        assert!(default.contains("Pregunta: ¿Habilidades?"));
        assert!(!default.contains("{name}"));
    }

    #[test]
    fn test_terminal_messages() {
        let en = Messages::for_language(Language::En);
        assert_eq!(
            Resolution::NotFound("ana".to_string()).message(&en).unwrap(),
            "CV not found for ana."
        );
        assert!(Resolution::NoDefault.message(&en).is_some());
        assert!(Resolution::NoneFound.message(&en).is_some());
    }
}
