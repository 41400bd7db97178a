//! Result cache for repeated validation
//!
//! Keyed by file path; an entry is reused only when both the content hash and
//! the rule-set fingerprint still match.

use crate::diagnostic::Violation;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Cache entry for a single file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Content hash of the file
    pub content_hash: String,
    /// Violations produced for that content
    pub violations: Vec<Violation>,
}

/// Cache of per-file validation results
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ResultCache {
    /// Cache version (bump to invalidate all caches)
    pub version: u32,
    /// Fingerprint of the rule set the entries were produced with
    #[serde(default)]
    pub ruleset: String,
    /// Entries by file path
    pub entries: HashMap<String, CacheEntry>,
}

impl ResultCache {
    /// Current cache format version
    const CACHE_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            version: Self::CACHE_VERSION,
            ruleset: String::new(),
            entries: HashMap::new(),
        }
    }

    /// Load cache from file. A version mismatch yields an empty cache.
    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let file = fs::File::open(path)?;
        let mut reader = std::io::BufReader::new(file);
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;

        let cache: Self = serde_json::from_slice(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        if cache.version != Self::CACHE_VERSION {
            return Ok(Self::new());
        }

        Ok(cache)
    }

    /// Save cache to file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_vec(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(&content)?;
        Ok(())
    }

    /// Record the current rule-set fingerprint, dropping entries if it changed
    pub fn set_ruleset(&mut self, fingerprint: &str) {
        if self.ruleset != fingerprint {
            self.entries.clear();
            self.ruleset = fingerprint.to_string();
        }
    }

    /// Cached violations for a file, if its content is unchanged
    pub fn get(&self, file: &Path, content_hash: &str) -> Option<&[Violation]> {
        let entry = self.entries.get(&key(file))?;
        (entry.content_hash == content_hash).then_some(entry.violations.as_slice())
    }

    /// Store violations for a file
    pub fn put(&mut self, file: &Path, content_hash: &str, violations: &[Violation]) {
        self.entries.insert(
            key(file),
            CacheEntry {
                content_hash: content_hash.to_string(),
                violations: violations.to_vec(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn key(file: &Path) -> String {
    file.to_string_lossy().to_string()
}

/// Hash file content
pub fn hash_content(content: &str) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

/// Default cache file location
pub fn default_cache_path(cache_dir: Option<&Path>) -> PathBuf {
    cache_dir
        .map(Path::to_path_buf)
        .or_else(dirs::cache_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("conformity")
        .join("cache.json")
}
