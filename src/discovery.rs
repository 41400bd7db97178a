//! File discovery and source reading
//!
//! The engine only talks to these traits, so tests and editors can swap the
//! filesystem for in-memory fixtures.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error expanding discovery patterns. Fatal for a whole validation pass.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("failed to read {path} during discovery: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Expands glob-style patterns into file paths
pub trait FileDiscovery: Send + Sync {
    /// Return matching files under `root`, minus anything matching `excludes`
    fn discover(
        &self,
        root: &Path,
        patterns: &[String],
        excludes: &[String],
    ) -> Result<Vec<PathBuf>, DiscoveryError>;
}

/// Reads file content
pub trait SourceReader: Send + Sync {
    fn read(&self, path: &Path) -> std::io::Result<String>;
}

/// Filesystem discovery using `glob` for expansion and `globset` for exclusions
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobDiscovery;

impl FileDiscovery for GlobDiscovery {
    fn discover(
        &self,
        root: &Path,
        patterns: &[String],
        excludes: &[String],
    ) -> Result<Vec<PathBuf>, DiscoveryError> {
        let exclude_set = build_glob_set(excludes)?;
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        // The root is a literal path; only the patterns carry glob syntax
        let base = glob::Pattern::escape(&root.to_string_lossy());
        for pattern in patterns {
            let full = Path::new(&base).join(pattern);
            let full = full.to_string_lossy();
            let paths = glob::glob(&full).map_err(|e| DiscoveryError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;

            for entry in paths {
                let path = entry.map_err(|e| DiscoveryError::Walk {
                    path: e.path().to_path_buf(),
                    source: e.into_error(),
                })?;
                if !path.is_file() || is_excluded(&exclude_set, root, &path) {
                    continue;
                }
                if seen.insert(path.clone()) {
                    files.push(path);
                }
            }
        }

        log::debug!(
            "discovered {} file(s) for {} pattern(s) under {}",
            files.len(),
            patterns.len(),
            root.display()
        );
        Ok(files)
    }
}

/// Compile exclusion globs into one set
pub fn build_glob_set(patterns: &[String]) -> Result<GlobSet, DiscoveryError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| DiscoveryError::InvalidPattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| DiscoveryError::InvalidPattern {
        pattern: patterns.join(","),
        message: e.to_string(),
    })
}

fn is_excluded(set: &GlobSet, root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    set.is_match(relative) || set.is_match(path)
}

/// Reads files from disk as UTF-8
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl SourceReader for FsReader {
    fn read(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// In-memory files, keyed by path. Serves as both reader and discovery.
#[derive(Debug, Clone, Default)]
pub struct MemoryFiles {
    files: HashMap<PathBuf, String>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, content: &str) -> Self {
        self.files.insert(path.into(), content.to_string());
        self
    }
}

impl SourceReader for MemoryFiles {
    fn read(&self, path: &Path) -> std::io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )
        })
    }
}

impl FileDiscovery for MemoryFiles {
    fn discover(
        &self,
        root: &Path,
        patterns: &[String],
        excludes: &[String],
    ) -> Result<Vec<PathBuf>, DiscoveryError> {
        let include_set = build_glob_set(patterns)?;
        let exclude_set = build_glob_set(excludes)?;

        let mut files: Vec<PathBuf> = self
            .files
            .keys()
            .filter(|p| {
                let relative = p.strip_prefix(root).unwrap_or(p);
                include_set.is_match(relative) && !is_excluded(&exclude_set, root, p)
            })
            .cloned()
            .collect();
        files.sort();
        Ok(files)
    }
}
