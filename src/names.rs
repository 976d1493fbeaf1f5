//! Name extraction collaborators.
//!
//! Two questions are put to a language model: "whose CV is this?" once per
//! registration, and "which known people does this query mention?" once per
//! query. [`NameExtractor`] is the seam; [`LlmNameExtractor`] answers both
//! with a [`CompletionProvider`] at the extraction temperature.
//!
//! Parsing of the raw model output lives here as plain functions so the
//! resolver can treat a bad answer exactly like a failed call.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::llm::CompletionProvider;
use crate::registry::AliasTable;

/// Sentinel the model is asked to return when no name is present.
pub const UNKNOWN_SENTINEL: &str = "UNKNOWN";

/// Spanish sentinel, also accepted.
const UNKNOWN_SENTINEL_ES: &str = "DESCONOCIDO";

#[async_trait]
pub trait NameExtractor: Send + Sync {
    /// Full name of the person a document belongs to, `None` when unknown.
    async fn extract_display_name(&self, document_prefix: &str) -> Result<Option<String>>;

    /// Raw comma-separated names the model found for a mention prompt.
    async fn extract_mentioned_names(&self, prompt: &str) -> Result<String>;
}

pub struct LlmNameExtractor {
    completion: Arc<dyn CompletionProvider>,
    temperature: f32,
}

impl LlmNameExtractor {
    pub fn new(completion: Arc<dyn CompletionProvider>, temperature: f32) -> Self {
        Self {
            completion,
            temperature,
        }
    }
}

#[async_trait]
impl NameExtractor for LlmNameExtractor {
    async fn extract_display_name(&self, document_prefix: &str) -> Result<Option<String>> {
        let raw = self
            .completion
            .complete(&display_name_prompt(document_prefix), self.temperature)
            .await?;
        Ok(parse_display_name(&raw))
    }

    async fn extract_mentioned_names(&self, prompt: &str) -> Result<String> {
        self.completion.complete(prompt, self.temperature).await
    }
}

/// The first `max_chars` characters of a document.
pub fn document_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn display_name_prompt(document_prefix: &str) -> String {
    format!(
        "Extract the full name of the person this CV belongs to.
Reply with the full name ONLY, without any additional text.
If you cannot find the name, reply '{}'.

CV:
{}",
        UNKNOWN_SENTINEL, document_prefix
    )
}

/// Interpret a display-name answer. Empty answers and sentinels are unknown.
pub fn parse_display_name(raw: &str) -> Option<String> {
    let name = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if name.is_empty()
        || name.eq_ignore_ascii_case(UNKNOWN_SENTINEL)
        || name.eq_ignore_ascii_case(UNKNOWN_SENTINEL_ES)
    {
        return None;
    }
    Some(name.to_string())
}

/// Mention-extraction prompt listing every known person with their aliases.
///
/// `known` pairs each display name with the alias fragments that resolve to it.
pub fn mention_prompt(known: &[(String, Vec<String>)], query: &str) -> String {
    let known_names = known
        .iter()
        .map(|(display, aliases)| format!("- {} (aliases: {})", display, aliases.join(", ")))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "From the following query, extract the names of the people mentioned.
If no names are mentioned, reply with an empty list.
Reply only with the names found, separated by commas.

Known names and their variations:
{}

Query: {}

Important: only return names that appear in the list of known names.",
        known_names, query
    )
}

/// Map a comma-separated model answer to canonical ids.
///
/// Candidates are lowercased and looked up in `aliases`; unknown candidates
/// are dropped and repeats collapse to their first occurrence.
pub fn parse_mentions(raw: &str, aliases: &AliasTable) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for candidate in raw.split(',') {
        let candidate = candidate
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c.is_whitespace())
            .to_lowercase();
        if candidate.is_empty() {
            continue;
        }
        if let Some(id) = aliases.resolve(&candidate) {
            if !ids.iter().any(|existing| existing == id) {
                ids.push(id.to_string());
            }
        }
    }
    ids
}
