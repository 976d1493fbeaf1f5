//! Directory ingestion: every CV under `[entities].documents_dir`.
//!
//! Files are matched against `include_globs`, read through
//! [`extract`](crate::extract), and registered with the file stem as the
//! identifier. A file that cannot be read or stored is reported and skipped;
//! the rest of the directory still loads.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::assistant::Assistant;
use crate::config::Config;
use crate::extract::read_document;

#[derive(Debug, Clone)]
pub struct IngestedDocument {
    pub identifier: String,
    pub path: PathBuf,
    pub display_name: String,
    pub chunk_count: usize,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub registered: Vec<IngestedDocument>,
    /// Path and reason for each skipped file.
    pub failed: Vec<(PathBuf, String)>,
    /// Whether the configured override id was among the registered files.
    pub override_loaded: bool,
}

/// Files under `root` matching `include_globs`, sorted by relative path.
pub fn scan_documents(root: &Path, include_globs: &[String]) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        bail!("Documents directory does not exist: {}", root.display());
    }
    let include_set = build_globset(include_globs)?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if include_set.is_match(relative) {
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();
    Ok(paths)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn identifier_for(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Register every document in the configured directory.
///
/// `default_candidate` names an identifier to offer as default when the
/// override id is absent.
pub async fn ingest_directory(
    assistant: &Assistant,
    config: &Config,
    default_candidate: Option<&str>,
) -> Result<IngestReport> {
    let override_id = config.entities.default_override_id.to_lowercase();
    let candidate = default_candidate.map(|c| c.trim().to_lowercase());
    let paths = scan_documents(&config.entities.documents_dir, &config.entities.include_globs)?;

    let mut report = IngestReport::default();
    for path in paths {
        let Some(identifier) = identifier_for(&path) else {
            report
                .failed
                .push((path, "file name has no usable stem".to_string()));
            continue;
        };

        let text = match read_document(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable document");
                report.failed.push((path, e.to_string()));
                continue;
            }
        };

        let lowered = identifier.to_lowercase();
        let is_candidate = lowered == override_id || candidate.as_deref() == Some(lowered.as_str());

        match assistant
            .register_document(&identifier, &text, is_candidate)
            .await
        {
            Ok(entity) => {
                if entity.canonical_id == override_id {
                    report.override_loaded = true;
                }
                report.registered.push(IngestedDocument {
                    identifier: entity.canonical_id,
                    path,
                    display_name: entity.display_name,
                    chunk_count: entity.chunk_count,
                });
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to register document");
                report.failed.push((path, e.to_string()));
            }
        }
    }

    if report.registered.is_empty() {
        warn!(dir = %config.entities.documents_dir.display(), "no CVs were loaded");
    } else {
        if !report.override_loaded {
            warn!(
                id = %config.entities.default_override_id,
                "default CV not found; queries without a name only work if another default was chosen"
            );
        }
        info!(count = report.registered.len(), "CVs loaded");
    }
    Ok(report)
}
