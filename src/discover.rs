//! Input discovery.
//!
//! Walks every input directory, keeps the files matched by the include
//! globs and not matched by the exclude globs, and tags each one with its
//! provenance: the last few segments of the input directory followed by
//! the path relative to it (`MercadoLivre/data/raw/2025/lote.csv`).

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::DiscoveryConfig;

/// Directories nobody wants to unify.
const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub source_tag: String,
}

#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<DiscoveredFile>,
    /// Inputs that did not exist or were not directories.
    pub skipped_inputs: Vec<PathBuf>,
}

pub fn discover(inputs: &[PathBuf], config: &DiscoveryConfig) -> Result<Discovery> {
    let include_set = build_globset(&config.include_globs)?;

    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut discovery = Discovery::default();
    let mut seen = BTreeSet::new();

    for root in inputs {
        if !root.is_dir() {
            warn!(input = %root.display(), "input directory does not exist, skipping");
            discovery.skipped_inputs.push(root.clone());
            continue;
        }

        let prefix = tag_prefix(root, config.source_tag_segments);
        let mut found = Vec::new();

        for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "unreadable directory entry, skipping");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = slash_path(relative);

            if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
                continue;
            }

            let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            if !seen.insert(absolute) {
                continue;
            }

            let source_tag = if prefix.is_empty() {
                rel_str
            } else {
                format!("{}/{}", prefix, rel_str)
            };
            found.push(DiscoveredFile {
                path: path.to_path_buf(),
                source_tag,
            });
        }

        found.sort_by(|a, b| a.source_tag.cmp(&b.source_tag));
        debug!(input = %root.display(), files = found.len(), "discovered input files");
        discovery.files.extend(found);
    }

    Ok(discovery)
}

/// Last `segments` normal components of `root`, resolved to an absolute
/// path first so that `.` and `..` inputs still produce useful tags.
pub fn tag_prefix(root: &Path, segments: usize) -> String {
    if segments == 0 {
        return String::new();
    }
    let resolved = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let parts: Vec<String> = resolved
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    let start = parts.len().saturating_sub(segments);
    parts[start..].join("/")
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .literal_separator(true)
            .build()
            .with_context(|| format!("Invalid glob pattern: {}", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
