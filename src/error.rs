//! Error taxonomy for the retrieval and resolution core.
//!
//! Collaborators (embedding, vector store, completion, extraction) return
//! `anyhow::Result`; the core maps their failures into [`HarnessError`] at
//! the point where the failure's meaning is known.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// Name or mention extraction produced nothing usable.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Writing to a retrieval namespace failed; nothing from the batch is kept.
    #[error("Storage error in namespace '{namespace}': {source}")]
    Storage {
        namespace: String,
        #[source]
        source: anyhow::Error,
    },

    /// Similarity search against a namespace failed.
    #[error("Retrieval error in namespace '{namespace}': {source}")]
    Retrieval {
        namespace: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// The final completion call failed.
    #[error("Generation failed: {0}")]
    Generation(#[source] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl HarnessError {
    pub fn storage(namespace: &str, source: impl Into<anyhow::Error>) -> Self {
        HarnessError::Storage {
            namespace: namespace.to_string(),
            source: source.into(),
        }
    }

    pub fn retrieval(namespace: &str, source: impl Into<anyhow::Error>) -> Self {
        HarnessError::Retrieval {
            namespace: namespace.to_string(),
            source: source.into(),
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
