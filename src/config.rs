//! TOML configuration for cv-harness.
//!
//! Every section has defaults, so an empty file is a valid (offline,
//! in-memory) configuration. [`load_config`] parses and validates.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk::FLUSH_THRESHOLD;
use crate::error::HarnessError;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub entities: EntitiesConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_kind")]
    pub kind: String,
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: default_store_kind(),
            path: default_store_path(),
        }
    }
}

fn default_store_kind() -> String {
    "memory".to_string()
}
fn default_store_path() -> PathBuf {
    PathBuf::from("./data/cvh.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_flush_chars")]
    pub flush_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            flush_chars: default_flush_chars(),
        }
    }
}

fn default_flush_chars() -> usize {
    FLUSH_THRESHOLD
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_true")]
    pub filter_by_query_type: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            filter_by_query_type: true,
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct EntitiesConfig {
    /// Identifier that always becomes the default entity when registered.
    #[serde(default = "default_override_id")]
    pub default_override_id: String,
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default = "default_name_prefix_chars")]
    pub name_prefix_chars: usize,
}

impl Default for EntitiesConfig {
    fn default() -> Self {
        Self {
            default_override_id: default_override_id(),
            documents_dir: default_documents_dir(),
            include_globs: default_include_globs(),
            name_prefix_chars: default_name_prefix_chars(),
        }
    }
}

fn default_override_id() -> String {
    "manuel_pineyro".to_string()
}
fn default_documents_dir() -> PathBuf {
    PathBuf::from("./data/cvs")
}
fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.pdf".to_string(),
        "**/*.docx".to_string(),
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
    ]
}
fn default_name_prefix_chars() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_embedding_provider() -> String {
    "hash".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub extraction_temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            base_url: default_llm_base_url(),
            model: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            extraction_temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
        }
    }
}

fn default_llm_provider() -> String {
    "disabled".to_string()
}
fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_llm_max_retries() -> u32 {
    3
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    /// Configuration used by commands that run without a config file.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config).map_err(|e| HarnessError::Config(e.to_string()))?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    match config.store.kind.as_str() {
        "memory" | "sqlite" => {}
        other => anyhow::bail!("Unknown store kind: '{}'. Must be memory or sqlite.", other),
    }

    if config.chunking.flush_chars == 0 {
        anyhow::bail!("chunking.flush_chars must be > 0");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.entities.default_override_id.trim().is_empty() {
        anyhow::bail!("entities.default_override_id must not be empty");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "hash" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hash, openai, ollama, or local.",
            other
        ),
    }

    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }

    if matches!(config.embedding.provider.as_str(), "openai" | "ollama") {
        if config.embedding.dims.is_none() {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.llm.provider.as_str() {
        "disabled" => {}
        "openai" => {
            if config.llm.model.is_none() {
                anyhow::bail!("llm.model must be specified when provider is 'openai'");
            }
        }
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.store.kind, "memory");
        assert_eq!(config.chunking.flush_chars, 500);
        assert_eq!(config.retrieval.top_k, 3);
        assert!(config.retrieval.filter_by_query_type);
        assert_eq!(config.entities.default_override_id, "manuel_pineyro");
        assert_eq!(config.embedding.provider, "hash");
        assert!(!config.llm.is_enabled());
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
[store]
kind = "sqlite"
path = "/tmp/cvh.sqlite"

[retrieval]
top_k = 5
filter_by_query_type = false

[entities]
default_override_id = "ana_garcia"
documents_dir = "/srv/cvs"

[embedding]
provider = "openai"
model = "text-embedding-3-small"
dims = 1536

[llm]
provider = "openai"
model = "mixtral-8x7b-32768"
temperature = 0.7
"#,
        )
        .unwrap();
        assert_eq!(config.store.kind, "sqlite");
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.entities.default_override_id, "ana_garcia");
        assert_eq!(config.embedding.dims, Some(1536));
        assert_eq!(config.llm.api_key_env, "GROQ_API_KEY");
    }

    #[test]
    fn test_rejects_unknown_store() {
        assert!(parse("[store]\nkind = \"redis\"").is_err());
    }

    #[test]
    fn test_rejects_zero_top_k() {
        assert!(parse("[retrieval]\ntop_k = 0").is_err());
    }

    #[test]
    fn test_openai_embedding_requires_model() {
        let err = parse("[embedding]\nprovider = \"openai\"\ndims = 1536").unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
    }

    #[test]
    fn test_load_config_reports_validation_as_config_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cvh.toml");
        std::fs::write(&path, "[chunking]\nflush_chars = 0\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HarnessError>(),
            Some(HarnessError::Config(_))
        ));
        assert!(err.to_string().contains("flush_chars"));
    }

    #[test]
    fn test_llm_requires_model() {
        assert!(parse("[llm]\nprovider = \"openai\"").is_err());
        assert!(parse("[llm]\nprovider = \"anthropic\"\nmodel = \"x\"").is_err());
    }
}
