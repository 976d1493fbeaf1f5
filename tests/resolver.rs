//! Query resolution scenarios against in-process collaborators.
//!
//! Name extraction and completion are scripted; storage is the in-memory
//! store with offline hash embeddings, optionally wrapped to count or fail
//! searches.

use anyhow::{bail, Result};
use async_trait::async_trait;
use cv_harness::assistant::Assistant;
use cv_harness::embedding::{EmbeddingProvider, HashProvider};
use cv_harness::language::LanguageClassifier;
use cv_harness::llm::CompletionProvider;
use cv_harness::models::ContentType;
use cv_harness::names::NameExtractor;
use cv_harness::registry::EntityRegistry;
use cv_harness::resolver::{QueryResolver, Resolution};
use cv_harness::store::{InMemoryStore, ScoredChunk, StoredChunk, VectorStore};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ─── Collaborators ──────────────────────────────────────────────────

/// Display name = first line of the document. Mentions = whatever was
/// scripted, or an error when nothing was.
#[derive(Default)]
struct ScriptedNames {
    mentions: Mutex<Option<String>>,
    mention_calls: AtomicUsize,
}

impl ScriptedNames {
    fn answer_mentions(&self, raw: &str) {
        *self.mentions.lock().unwrap() = Some(raw.to_string());
    }
}

#[async_trait]
impl NameExtractor for ScriptedNames {
    async fn extract_display_name(&self, prefix: &str) -> Result<Option<String>> {
        Ok(prefix.lines().next().map(|l| l.trim().to_string()))
    }

    async fn extract_mentioned_names(&self, prompt: &str) -> Result<String> {
        self.mention_calls.fetch_add(1, Ordering::SeqCst);
        assert!(prompt.contains("Known names"));
        match self.mentions.lock().unwrap().clone() {
            Some(raw) => Ok(raw),
            None => bail!("503 Service Unavailable"),
        }
    }
}

#[derive(Default)]
struct RecordingCompletion {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl CompletionProvider for RecordingCompletion {
    fn model_name(&self) -> &str {
        "recording"
    }
    async fn complete(&self, prompt: &str, _temperature: f32) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("generated answer".to_string())
    }
}

/// In-memory store that counts searches and can be told to fail them.
#[derive(Default)]
struct ProbeStore {
    inner: InMemoryStore,
    searches: AtomicUsize,
    fail_search: bool,
}

#[async_trait]
impl VectorStore for ProbeStore {
    async fn upsert(&self, namespace: &str, items: &[StoredChunk]) -> Result<()> {
        self.inner.upsert(namespace, items).await
    }
    async fn replace(&self, namespace: &str, items: &[StoredChunk]) -> Result<()> {
        self.inner.replace(namespace, items).await
    }
    async fn hashes(&self, namespace: &str) -> Result<Vec<String>> {
        self.inner.hashes(namespace).await
    }
    async fn search(
        &self,
        namespace: &str,
        query_vec: &[f32],
        k: usize,
        content_type: Option<ContentType>,
    ) -> Result<Vec<ScoredChunk>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail_search {
            bail!("vector index unreachable");
        }
        self.inner.search(namespace, query_vec, k, content_type).await
    }
    async fn clear(&self, namespace: &str) -> Result<()> {
        self.inner.clear(namespace).await
    }
    async fn count(&self, namespace: &str) -> Result<usize> {
        self.inner.count(namespace).await
    }
}

struct Harness {
    assistant: Assistant,
    names: Arc<ScriptedNames>,
    completion: Arc<RecordingCompletion>,
    store: Arc<ProbeStore>,
}

fn harness_with(store: ProbeStore) -> Harness {
    let names = Arc::new(ScriptedNames::default());
    let completion = Arc::new(RecordingCompletion::default());
    let store = Arc::new(store);

    let registry = EntityRegistry::new(
        "manuel_pineyro",
        store.clone(),
        Arc::new(HashProvider::new(128)),
        names.clone(),
    );
    let resolver = QueryResolver::new(names.clone(), LanguageClassifier::default())
        .with_top_k(2)
        .with_query_type_filter(true);
    let assistant = Assistant::new(registry, resolver, completion.clone(), 0.7);

    Harness {
        assistant,
        names,
        completion,
        store,
    }
}

fn harness() -> Harness {
    harness_with(ProbeStore::default())
}

const JOHN_CV: &str = "John Doe
EXPERIENCE
Site reliability engineer at Initech, on-call rotation lead
SKILLS
Terraform, Go, Prometheus";

const ANA_CV: &str = "Ana García
EXPERIENCIA
Arquitecta de software en Globex
HABILIDADES
Python, Kubernetes";

const CARLOS_CV: &str = "Carlos Ruiz
EXPERIENCE
Data engineer at Umbrella
SKILLS
Spark, Scala";

// ─── Scenarios ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_single_mention_uses_that_namespace_only() {
    let h = harness();
    h.assistant
        .register_document("john_doe", JOHN_CV, false)
        .await
        .unwrap();
    h.assistant
        .register_document("carlos_ruiz", CARLOS_CV, false)
        .await
        .unwrap();
    h.names.answer_mentions("John");

    let resolution = h
        .assistant
        .resolve("What is John's experience?")
        .await
        .unwrap();
    let Resolution::Prompt(resolved) = resolution else {
        panic!("expected a prompt, got {:?}", resolution);
    };
    assert_eq!(resolved.entities, vec!["john_doe".to_string()]);
    assert_eq!(resolved.subject.as_deref(), Some("John Doe"));
    assert!(!resolved.context.is_empty());
    assert!(resolved.context.iter().all(|i| i.namespace == "cv_john_doe"));
    assert!(resolved.prompt.contains("John Doe's CV"));
    assert!(resolved.prompt.contains("Question: What is John's experience?"));
}

#[tokio::test]
async fn test_no_entities_and_no_default_skips_retrieval() {
    let h = harness();

    let answer = h.assistant.answer("What is the experience?").await;
    assert_eq!(answer, "No person was mentioned and no default CV is configured.");
    assert_eq!(h.store.searches.load(Ordering::SeqCst), 0);
    assert_eq!(h.names.mention_calls.load(Ordering::SeqCst), 0);
    assert!(h.completion.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_registered_but_no_default_and_no_mention() {
    let h = harness();
    h.assistant
        .register_document("carlos_ruiz", CARLOS_CV, false)
        .await
        .unwrap();
    h.names.answer_mentions("");

    let answer = h.assistant.answer("¿Qué experiencia tiene?").await;
    assert_eq!(
        answer,
        "No se mencionó a ninguna persona y no hay un CV predeterminado configurado."
    );
    assert_eq!(h.store.searches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_two_mentions_concatenate_in_match_order() {
    let h = harness();
    h.assistant
        .register_document("ana_garcia", ANA_CV, false)
        .await
        .unwrap();
    h.assistant
        .register_document("carlos_ruiz", CARLOS_CV, false)
        .await
        .unwrap();
    h.names.answer_mentions("Carlos, Ana, carlos");

    let Resolution::Prompt(resolved) = h
        .assistant
        .resolve("Compare Ana and Carlos")
        .await
        .unwrap()
    else {
        panic!("expected a prompt");
    };

    assert_eq!(
        resolved.entities,
        vec!["carlos_ruiz".to_string(), "ana_garcia".to_string()]
    );
    assert_eq!(resolved.subject.as_deref(), Some("Carlos Ruiz, Ana García"));
    assert_eq!(resolved.context.len(), 4);
    let namespaces: Vec<&str> = resolved.context.iter().map(|i| i.namespace.as_str()).collect();
    assert_eq!(
        namespaces,
        vec!["cv_carlos_ruiz", "cv_carlos_ruiz", "cv_ana_garcia", "cv_ana_garcia"]
    );
    assert!(resolved.prompt.contains("Carlos Ruiz, Ana García"));
}

#[tokio::test]
async fn test_unknown_names_in_mentions_are_dropped() {
    let h = harness();
    h.assistant
        .register_document("manuel_pineyro", "Manuel Piñeyro\nSKILLS\nRust", false)
        .await
        .unwrap();
    h.names.answer_mentions("Bob, Alice");

    let Resolution::Prompt(resolved) = h.assistant.resolve("Compare Bob and Alice").await.unwrap()
    else {
        panic!("expected the default prompt");
    };
    assert_eq!(resolved.subject, None);
    assert_eq!(resolved.entities, vec!["manuel_pineyro".to_string()]);
}

#[tokio::test]
async fn test_mention_failure_falls_back_to_default() {
    let h = harness();
    h.assistant
        .register_document("carlos_ruiz", CARLOS_CV, true)
        .await
        .unwrap();
    // No scripted answer: extraction errors out.

    let answer = h.assistant.answer("What about Carlos?").await;
    assert_eq!(answer, "generated answer");
    let prompts = h.completion.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("primary candidate's CV"));
}

#[tokio::test]
async fn test_filter_relaxes_when_query_type_matches_nothing() {
    let h = harness();
    h.assistant
        .register_document("carlos_ruiz", CARLOS_CV, false)
        .await
        .unwrap();
    h.names.answer_mentions("carlos");

    // "university" asks for education; Carlos's CV has no education chunk.
    let Resolution::Prompt(resolved) = h
        .assistant
        .resolve("Which university did Carlos attend?")
        .await
        .unwrap()
    else {
        panic!("expected a prompt");
    };
    assert!(!resolved.context.is_empty());
    assert!(resolved
        .context
        .iter()
        .all(|i| i.content_type != ContentType::Education));
    // One filtered search, one unfiltered retry.
    assert_eq!(h.store.searches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_reserved_identifier_overrides_default() {
    let h = harness();
    h.assistant
        .register_document("carlos_ruiz", CARLOS_CV, true)
        .await
        .unwrap();
    h.assistant
        .register_document("Manuel_Pineyro", "Manuel Piñeyro\nSKILLS\nRust", false)
        .await
        .unwrap();

    let registry = h.assistant.registry().await;
    assert_eq!(
        registry.default_entity().unwrap().canonical_id,
        "manuel_pineyro"
    );
}

#[tokio::test]
async fn test_alias_fragments_resolve() {
    let h = harness();
    h.assistant
        .register_document("ana_garcia", "Ana García Lopez\nSKILLS\nRust", false)
        .await
        .unwrap();

    let registry = h.assistant.registry().await;
    for alias in ["ana", "garcia", "lopez", "garcia lopez", "ana garcia", "ana garcia lopez"] {
        assert_eq!(registry.resolve_alias(alias), Some("ana_garcia"), "{}", alias);
    }
}

#[tokio::test]
async fn test_retrieval_failure_becomes_error_text() {
    let h = harness_with(ProbeStore {
        fail_search: true,
        ..ProbeStore::default()
    });
    h.assistant
        .register_document("manuel_pineyro", "Manuel Piñeyro\nSKILLS\nRust", false)
        .await
        .unwrap();

    let answer = h.assistant.answer("What are the skills?").await;
    assert!(answer.starts_with("Error processing the query:"), "{}", answer);
    assert!(answer.contains("cv_manuel_pineyro"));
    assert!(h.completion.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_registration_while_answering() {
    let h = Arc::new(harness());
    h.assistant
        .register_document("manuel_pineyro", "Manuel Piñeyro\nSKILLS\nRust", false)
        .await
        .unwrap();
    h.names.answer_mentions("");

    let writer = {
        let h = h.clone();
        tokio::spawn(async move {
            for i in 0..5 {
                h.assistant
                    .register_document(&format!("person_{}", i), "Someone\nSKILLS\nGo", false)
                    .await
                    .unwrap();
            }
        })
    };
    for _ in 0..5 {
        assert_eq!(h.assistant.answer("What are the skills?").await, "generated answer");
    }
    writer.await.unwrap();

    assert_eq!(h.assistant.registry().await.len(), 6);
}

#[tokio::test]
async fn test_storage_failure_leaves_registry_untouched() {
    struct RejectingStore;

    #[async_trait]
    impl VectorStore for RejectingStore {
        async fn upsert(&self, _ns: &str, _items: &[StoredChunk]) -> Result<()> {
            bail!("quota exceeded")
        }
        async fn replace(&self, _ns: &str, _items: &[StoredChunk]) -> Result<()> {
            bail!("quota exceeded")
        }
        async fn hashes(&self, _ns: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn search(
            &self,
            _ns: &str,
            _q: &[f32],
            _k: usize,
            _ct: Option<ContentType>,
        ) -> Result<Vec<ScoredChunk>> {
            Ok(Vec::new())
        }
        async fn clear(&self, _ns: &str) -> Result<()> {
            Ok(())
        }
        async fn count(&self, _ns: &str) -> Result<usize> {
            Ok(0)
        }
    }

    let names = Arc::new(ScriptedNames::default());
    let mut registry = EntityRegistry::new(
        "manuel_pineyro",
        Arc::new(RejectingStore),
        Arc::new(HashProvider::new(16)),
        names,
    );
    let err = registry
        .register("manuel_pineyro", "Manuel Piñeyro\nSKILLS\nRust", true)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("quota exceeded"));
    assert!(registry.is_empty());
    assert!(registry.default_entity().is_none());
    assert_eq!(registry.resolve_alias("manuel"), None);
}

#[tokio::test]
async fn test_failed_reregistration_keeps_stored_cv() {
    struct SwitchableEmbedder {
        inner: HashProvider,
        fail: AtomicBool,
    }

    #[async_trait]
    impl EmbeddingProvider for SwitchableEmbedder {
        fn model_name(&self) -> &str {
            "switchable"
        }
        fn dims(&self) -> usize {
            self.inner.dims()
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if self.fail.load(Ordering::SeqCst) {
                bail!("embedding service down");
            }
            self.inner.embed(texts).await
        }
    }

    let store = Arc::new(InMemoryStore::new());
    let embedder = Arc::new(SwitchableEmbedder {
        inner: HashProvider::new(64),
        fail: AtomicBool::new(false),
    });
    let mut registry = EntityRegistry::new(
        "manuel_pineyro",
        store.clone(),
        embedder.clone(),
        Arc::new(ScriptedNames::default()),
    );
    registry
        .register("ana_garcia", "Ana García\nSKILLS\nRust, Kubernetes", false)
        .await
        .unwrap();
    assert_eq!(store.count("cv_ana_garcia").await.unwrap(), 2);

    embedder.fail.store(true, Ordering::SeqCst);
    let err = registry
        .register(
            "ana_garcia",
            "Ana García\nSKILLS\nCOBOL\nEDUCATION\nHistory degree",
            false,
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("embedding service down"));

    let entity = registry.lookup("ana_garcia").unwrap();
    assert_eq!(entity.chunk_count, 2);
    assert_eq!(store.count("cv_ana_garcia").await.unwrap(), 2);

    embedder.fail.store(false, Ordering::SeqCst);
    let hits = entity.namespace.search("kubernetes", 3, None).await.unwrap();
    assert!(hits.iter().any(|h| h.text.contains("Kubernetes")));
}
