//! Core data models used throughout cv-harness.
//!
//! These types represent the chunks, labels, and retrieval results that
//! flow between the segmenter, the retrieval namespaces, and the resolver.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Languages the assistant answers in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Es,
    En,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Es => "es",
            Language::En => "en",
        }
    }

    /// Parse an ISO 639-1 code. Anything other than `es`/`en` is `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "es" => Some(Language::Es),
            "en" => Some(Language::En),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// CV section a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Experience,
    Education,
    Skills,
    Projects,
    Summary,
    General,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Experience => "experience",
            Section::Education => "education",
            Section::Skills => "skills",
            Section::Projects => "projects",
            Section::Summary => "summary",
            Section::General => "general",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "experience" => Ok(Section::Experience),
            "education" => Ok(Section::Education),
            "skills" => Ok(Section::Skills),
            "projects" => Ok(Section::Projects),
            "summary" => Ok(Section::Summary),
            "general" => Ok(Section::General),
            other => anyhow::bail!("Unknown section: '{}'", other),
        }
    }
}

/// Kind of content a chunk carries, independent of its section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Technologies,
    Education,
    Leadership,
    Achievements,
    General,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Technologies => "technologies",
            ContentType::Education => "education",
            ContentType::Leadership => "leadership",
            ContentType::Achievements => "achievements",
            ContentType::General => "general",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "technologies" => Ok(ContentType::Technologies),
            "education" => Ok(ContentType::Education),
            "leadership" => Ok(ContentType::Leadership),
            "achievements" => Ok(ContentType::Achievements),
            "general" => Ok(ContentType::General),
            other => anyhow::bail!(
                "Unknown content type: '{}'. Must be technologies, education, leadership, achievements, or general.",
                other
            ),
        }
    }
}

/// A contiguous span of CV text with its classification labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub section: Section,
    pub content_type: ContentType,
}

/// Metadata persisted next to each chunk's embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Display name of the person the CV belongs to.
    pub cv_name: String,
    pub section: Section,
    pub content_type: ContentType,
}

/// One retrieved chunk, as handed to prompt assembly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResultItem {
    pub text: String,
    pub similarity_score: f64,
    pub section: Section,
    pub content_type: ContentType,
    pub namespace: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_codes() {
        assert_eq!(Language::from_code("ES"), Some(Language::Es));
        assert_eq!(Language::from_code(" en "), Some(Language::En));
        assert_eq!(Language::from_code("fr"), None);
        assert_eq!(Language::Es.to_string(), "es");
    }

    #[test]
    fn labels_parse_from_display() {
        for s in [
            Section::Experience,
            Section::Education,
            Section::Skills,
            Section::Projects,
            Section::Summary,
            Section::General,
        ] {
            assert_eq!(s.to_string().parse::<Section>().unwrap(), s);
        }
        assert!("cooking".parse::<ContentType>().is_err());
        assert_eq!(
            "leadership".parse::<ContentType>().unwrap(),
            ContentType::Leadership
        );
    }

    #[test]
    fn metadata_serializes_lowercase_labels() {
        let meta = ChunkMetadata {
            cv_name: "Ana García".to_string(),
            section: Section::Skills,
            content_type: ContentType::Technologies,
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"section\":\"skills\""));
        assert!(json.contains("\"content_type\":\"technologies\""));
    }
}
