//! Core validation engine

use crate::cache::{hash_content, ResultCache};
use crate::context::ValidationContext;
use crate::diagnostic::{Severity, Violation};
use crate::discovery::{DiscoveryError, FileDiscovery, FsReader, GlobDiscovery, SourceReader};
use crate::output::{self, OutputError, ReportOptions};
use crate::rule::Rule;
use rayon::prelude::*;
use serde::{Serialize, Serializer};
use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashSet};
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Rule id of the synthetic violation reported for unreadable files
pub const FILE_READ_ERROR: &str = "file-read-error";

/// Patterns used by [`Engine::validate_project`] when none are given
pub const DEFAULT_PATTERNS: &[&str] = &["**/*.ts", "**/*.tsx", "**/*.js", "**/*.jsx"];

/// Global discovery exclusions: dependencies, build output, generated declarations
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/node_modules/**",
    "**/dist/**",
    "**/build/**",
    "**/target/**",
    "**/*.d.ts",
];

/// Default number of files validated at once
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// A rule that failed instead of returning violations
#[derive(Debug, Error)]
pub enum RuleExecutionError {
    #[error("rule '{rule_id}' failed on {file}: {source:#}")]
    Failed {
        rule_id: String,
        file: PathBuf,
        source: anyhow::Error,
    },

    #[error("rule '{rule_id}' panicked on {file}: {message}")]
    Panicked {
        rule_id: String,
        file: PathBuf,
        message: String,
    },
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Base path for discovery and for resolving relative file paths
    pub project_root: PathBuf,
    /// Files validated concurrently per batch
    pub max_concurrency: usize,
    /// Reuse results for files whose content and rule set are unchanged
    pub enable_cache: bool,
    /// Log rule failures
    pub verbose: bool,
    /// Global discovery exclusions
    pub exclude_patterns: Vec<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            enable_cache: false,
            verbose: false,
            exclude_patterns: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl EngineOptions {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.enable_cache = enabled;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }
}

/// Result of validating one file
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    /// File path (relative to the project root when under it)
    pub file: PathBuf,
    /// Violations in rule registration order
    pub violations: Vec<Violation>,
    /// True iff no violation has error severity
    pub is_valid: bool,
    /// Wall-clock time for this file
    #[serde(rename = "execution_time_ms", serialize_with = "serialize_ms")]
    pub execution_time: Duration,
}

impl ValidationResult {
    pub fn new(file: PathBuf, violations: Vec<Violation>, execution_time: Duration) -> Self {
        let is_valid = !violations.iter().any(Violation::is_error);
        Self {
            file,
            violations,
            is_valid,
            execution_time,
        }
    }

    /// Count violations of one severity
    pub fn count(&self, severity: Severity) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity() == severity)
            .count()
    }
}

/// Counters for a validation pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub files_processed: usize,
    /// Successful rule invocations
    pub rules_executed: usize,
    pub total_violations: usize,
    pub violations_by_severity: BTreeMap<Severity, usize>,
    #[serde(rename = "execution_time_ms", serialize_with = "serialize_ms")]
    pub execution_time: Duration,
    #[serde(rename = "average_file_time_ms", serialize_with = "serialize_ms")]
    pub average_file_time: Duration,
}

impl Default for EngineStats {
    fn default() -> Self {
        Self {
            files_processed: 0,
            rules_executed: 0,
            total_violations: 0,
            violations_by_severity: Severity::ALL.iter().map(|s| (*s, 0)).collect(),
            execution_time: Duration::ZERO,
            average_file_time: Duration::ZERO,
        }
    }
}

impl EngineStats {
    /// Count of violations with the given severity
    pub fn count(&self, severity: Severity) -> usize {
        self.violations_by_severity
            .get(&severity)
            .copied()
            .unwrap_or(0)
    }

    fn record(&mut self, result: &ValidationResult, rules_executed: usize) {
        self.files_processed += 1;
        self.rules_executed += rules_executed;
        self.total_violations += result.violations.len();
        for violation in &result.violations {
            *self
                .violations_by_severity
                .entry(violation.severity())
                .or_insert(0) += 1;
        }
    }

    fn finish(&mut self, elapsed: Duration) {
        self.execution_time = elapsed;
        self.average_file_time = match u32::try_from(self.files_processed) {
            Ok(0) => Duration::ZERO,
            Ok(n) => elapsed / n,
            Err(_) => elapsed.div_f64(self.files_processed as f64),
        };
    }
}

fn serialize_ms<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

/// The main validation engine
pub struct Engine {
    options: EngineOptions,
    rules: Vec<Rule>,
    stats: Mutex<EngineStats>,
    cache: Mutex<ResultCache>,
    /// Recomputed whenever the rule set changes
    fingerprint: String,
    discovery: Box<dyn FileDiscovery>,
    reader: Box<dyn SourceReader>,
}

impl Engine {
    /// Create an engine backed by the filesystem
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            rules: Vec::new(),
            stats: Mutex::new(EngineStats::default()),
            cache: Mutex::new(ResultCache::new()),
            fingerprint: fingerprint(&[]),
            discovery: Box::new(GlobDiscovery),
            reader: Box::new(FsReader),
        }
    }

    /// Replace the file-discovery collaborator
    pub fn with_discovery(mut self, discovery: impl FileDiscovery + 'static) -> Self {
        self.discovery = Box::new(discovery);
        self
    }

    /// Replace the file-read collaborator
    pub fn with_reader(mut self, reader: impl SourceReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    /// Seed the result cache (e.g. loaded from disk)
    pub fn with_cache(self, cache: ResultCache) -> Self {
        *lock(&self.cache) = cache;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Registered rules, in registration order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
        self.fingerprint = fingerprint(&self.rules);
    }

    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = Rule>) {
        self.rules.extend(rules);
        self.fingerprint = fingerprint(&self.rules);
    }

    /// Remove every rule with this id; returns how many were removed
    pub fn remove_rule(&mut self, rule_id: &str) -> usize {
        let before = self.rules.len();
        self.rules.retain(|r| r.id() != rule_id);
        self.fingerprint = fingerprint(&self.rules);
        before - self.rules.len()
    }

    /// Snapshot of the current counters
    pub fn stats(&self) -> EngineStats {
        lock(&self.stats).clone()
    }

    pub fn reset_stats(&self) {
        *lock(&self.stats) = EngineStats::default();
    }

    /// Take the result cache out of the engine (e.g. to save it)
    pub fn take_cache(&self) -> ResultCache {
        std::mem::take(&mut *lock(&self.cache))
    }

    /// Validate one file. Read failures become a `file-read-error` violation.
    pub fn validate_file(&self, path: &Path) -> ValidationResult {
        let start = Instant::now();
        let display = self.display_path(path);

        let (result, rules_executed) = match self.reader.read(&self.resolve(path)) {
            Ok(content) => self.process(display, content, start),
            Err(e) => {
                log::debug!("failed to read {}: {}", path.display(), e);
                let violation = Violation::reserved(
                    FILE_READ_ERROR,
                    &format!("Failed to read file: {}", e),
                    &display,
                );
                (
                    ValidationResult::new(display, vec![violation], start.elapsed()),
                    0,
                )
            }
        };

        lock(&self.stats).record(&result, rules_executed);
        result
    }

    /// Validate in-memory content as if it were the file at `path`
    pub fn validate_source(&self, path: &Path, content: &str) -> ValidationResult {
        let start = Instant::now();
        let (result, rules_executed) =
            self.process(self.display_path(path), content.to_string(), start);
        lock(&self.stats).record(&result, rules_executed);
        result
    }

    /// Discover files matching `patterns` and validate them in bounded batches.
    ///
    /// Statistics are reset first. Discovery failures abort the whole call.
    pub fn validate_files(
        &self,
        patterns: &[String],
    ) -> Result<Vec<ValidationResult>, DiscoveryError> {
        let start = Instant::now();
        self.reset_stats();

        let files = dedup(self.discovery.discover(
            &self.options.project_root,
            patterns,
            &self.options.exclude_patterns,
        )?);

        let batch_size = self.options.max_concurrency.max(1);
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(batch_size)
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                log::warn!("failed to start worker pool, validating sequentially: {}", e);
                None
            }
        };

        let mut results = Vec::with_capacity(files.len());
        for (index, batch) in files.chunks(batch_size).enumerate() {
            log::debug!("validating batch {} ({} file(s))", index + 1, batch.len());
            let batch_results: Vec<ValidationResult> = match &pool {
                Some(pool) => {
                    pool.install(|| batch.par_iter().map(|f| self.validate_file(f)).collect())
                }
                None => batch.iter().map(|f| self.validate_file(f)).collect(),
            };
            results.extend(batch_results);
        }

        lock(&self.stats).finish(start.elapsed());
        Ok(results)
    }

    /// Validate the project, defaulting to [`DEFAULT_PATTERNS`]
    pub fn validate_project(
        &self,
        patterns: Option<&[String]>,
    ) -> Result<Vec<ValidationResult>, DiscoveryError> {
        match patterns {
            Some(p) if !p.is_empty() => self.validate_files(p),
            _ => {
                let defaults: Vec<String> = DEFAULT_PATTERNS.iter().map(|s| s.to_string()).collect();
                self.validate_files(&defaults)
            }
        }
    }

    /// Format results with the current statistics
    pub fn render_results(
        &self,
        results: &[ValidationResult],
        options: &ReportOptions,
    ) -> Result<String, OutputError> {
        output::render(results, &self.stats(), options)
    }

    /// Print formatted results to stdout
    pub fn print_results(
        &self,
        results: &[ValidationResult],
        options: &ReportOptions,
    ) -> Result<(), OutputError> {
        print!("{}", self.render_results(results, options)?);
        Ok(())
    }

    /// Fingerprint of the registered rules, for cache invalidation
    pub fn ruleset_fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Build the context and run every applicable rule
    fn process(&self, display: PathBuf, content: String, start: Instant) -> (ValidationResult, usize) {
        let content_hash = self.options.enable_cache.then(|| hash_content(&content));
        if let Some(hash) = &content_hash {
            let mut cache = lock(&self.cache);
            cache.set_ruleset(&self.fingerprint);
            if let Some(violations) = cache.get(&display, hash) {
                log::debug!("cache hit for {}", display.display());
                let violations = violations.to_vec();
                return (ValidationResult::new(display, violations, start.elapsed()), 0);
            }
        }

        let ctx = ValidationContext::new(display, content, self.options.project_root.clone());
        let mut violations = Vec::new();
        let mut rules_executed = 0;

        for rule in &self.rules {
            if !rule.applies_to(ctx.file_path()) {
                continue;
            }

            match run_rule(rule, &ctx) {
                Ok(found) => {
                    rules_executed += 1;
                    violations.extend(found);
                }
                Err(e) => {
                    if self.options.verbose {
                        log::warn!("{}", e);
                    } else {
                        log::debug!("{}", e);
                    }
                }
            }
        }

        if let Some(hash) = &content_hash {
            lock(&self.cache).put(ctx.file_path(), hash, &violations);
        }

        let display = ctx.file_path().to_path_buf();
        (
            ValidationResult::new(display, violations, start.elapsed()),
            rules_executed,
        )
    }

    /// Path to read. Discovered paths already carry the root and are used as is.
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() || path.starts_with(&self.options.project_root) {
            path.to_path_buf()
        } else {
            self.options.project_root.join(path)
        }
    }

    fn display_path(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.options.project_root)
            .unwrap_or(path)
            .to_path_buf()
    }
}

fn fingerprint(rules: &[Rule]) -> String {
    let mut hasher = DefaultHasher::new();
    for rule in rules {
        rule.id().hash(&mut hasher);
        rule.severity().hash(&mut hasher);
        for pattern in rule.file_patterns() {
            pattern.to_string().hash(&mut hasher);
        }
        "!".hash(&mut hasher);
        for pattern in rule.exclude_patterns() {
            pattern.to_string().hash(&mut hasher);
        }
    }
    format!("{}:{:x}", rules.len(), hasher.finish())
}

/// Run one rule inside its own error boundary
fn run_rule(rule: &Rule, ctx: &ValidationContext) -> Result<Vec<Violation>, RuleExecutionError> {
    match panic::catch_unwind(AssertUnwindSafe(|| rule.check(ctx))) {
        Ok(Ok(violations)) => Ok(violations),
        Ok(Err(source)) => Err(RuleExecutionError::Failed {
            rule_id: rule.id().to_string(),
            file: ctx.file_path().to_path_buf(),
            source,
        }),
        Err(payload) => Err(RuleExecutionError::Panicked {
            rule_id: rule.id().to_string(),
            file: ctx.file_path().to_path_buf(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn dedup(files: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    files.into_iter().filter(|f| seen.insert(f.clone())).collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::MemoryFiles;
    use crate::rule::create_rule;

    fn warn_rule(id: &str) -> Rule {
        let rule_id = id.to_string();
        create_rule()
            .id(id)
            .name("Warn")
            .description("Always warns")
            .validate(move |ctx| {
                Ok(vec![Violation::new(
                    &rule_id,
                    Severity::Warning,
                    "warned",
                    ctx.file_path(),
                )?])
            })
            .unwrap()
    }

    fn memory_engine(files: MemoryFiles) -> Engine {
        Engine::new(EngineOptions::new("/p"))
            .with_reader(files.clone())
            .with_discovery(files)
    }

    #[test]
    fn test_default_options() {
        let options = EngineOptions::default();
        assert_eq!(options.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert!(!options.enable_cache);
        assert!(options.exclude_patterns.contains(&"**/node_modules/**".to_string()));
        assert_eq!(EngineOptions::new(".").with_max_concurrency(0).max_concurrency, 1);
    }

    #[test]
    fn test_validation_result_validity() {
        let warn = Violation::new("r", Severity::Warning, "m", "a.ts").unwrap();
        let err = Violation::new("r", Severity::Error, "m", "a.ts").unwrap();

        let result = ValidationResult::new("a.ts".into(), vec![warn.clone()], Duration::ZERO);
        assert!(result.is_valid);
        let result = ValidationResult::new("a.ts".into(), vec![warn, err], Duration::ZERO);
        assert!(!result.is_valid);
        assert_eq!(result.count(Severity::Error), 1);
    }

    #[test]
    fn test_stats_average_guards_zero_files() {
        let mut stats = EngineStats::default();
        stats.finish(Duration::from_millis(10));
        assert_eq!(stats.average_file_time, Duration::ZERO);
        assert_eq!(stats.count(Severity::Info), 0);
        assert_eq!(stats.violations_by_severity.len(), 3);
    }

    #[test]
    fn test_remove_rule_removes_all_with_id() {
        let mut engine = Engine::new(EngineOptions::default());
        engine.add_rules([warn_rule("a"), warn_rule("b"), warn_rule("a")]);
        assert_eq!(engine.remove_rule("a"), 2);
        assert_eq!(engine.rules().len(), 1);
        assert_eq!(engine.remove_rule("missing"), 0);
    }

    #[test]
    fn test_duplicate_ids_both_run() {
        let mut engine = Engine::new(EngineOptions::default());
        engine.add_rule(warn_rule("dup"));
        engine.add_rule(warn_rule("dup"));

        let result = engine.validate_source(Path::new("a.ts"), "");
        assert_eq!(result.violations.len(), 2);
        assert_eq!(engine.stats().rules_executed, 2);
    }

    #[test]
    fn test_panicking_rule_is_isolated() {
        let mut engine = Engine::new(EngineOptions::default().with_verbose(true));
        engine.add_rule(
            create_rule()
                .id("boom")
                .name("Boom")
                .description("Panics")
                .validate(|_| panic!("rule bug"))
                .unwrap(),
        );
        engine.add_rule(warn_rule("ok"));

        let result = engine.validate_source(Path::new("a.ts"), "");
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].rule_id(), "ok");
        assert_eq!(engine.stats().rules_executed, 1);
    }

    #[test]
    fn test_run_rule_reports_error() {
        let rule = create_rule()
            .id("fails")
            .name("Fails")
            .description("Returns an error")
            .validate(|_| Err(anyhow::anyhow!("bad input")))
            .unwrap();
        let ctx = ValidationContext::new("a.ts", "", ".");

        let err = run_rule(&rule, &ctx).unwrap_err();
        assert_eq!(err.to_string(), "rule 'fails' failed on a.ts: bad input");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_display_path_is_relative_to_root() {
        let files = MemoryFiles::new().with_file("/p/src/a.ts", "x");
        let mut engine = memory_engine(files);
        engine.add_rule(warn_rule("w"));

        let result = engine.validate_file(Path::new("/p/src/a.ts"));
        assert_eq!(result.file, PathBuf::from("src/a.ts"));
        assert_eq!(result.violations[0].file(), Path::new("src/a.ts"));

        let result = engine.validate_file(Path::new("src/a.ts"));
        assert_eq!(result.violations.len(), 1);
    }

    #[test]
    fn test_cache_reuses_results() {
        let files = MemoryFiles::new().with_file("/p/a.ts", "x");
        let mut engine = Engine::new(EngineOptions::new("/p").with_cache(true)).with_reader(files);
        engine.add_rule(warn_rule("w"));

        let first = engine.validate_file(Path::new("a.ts"));
        let second = engine.validate_file(Path::new("a.ts"));
        assert_eq!(first.violations, second.violations);
        // Second run was served from the cache
        assert_eq!(engine.stats().rules_executed, 1);
        assert_eq!(engine.stats().total_violations, 2);

        engine.add_rule(warn_rule("w2"));
        let third = engine.validate_file(Path::new("a.ts"));
        assert_eq!(third.violations.len(), 2);
        assert_eq!(engine.take_cache().len(), 1);
    }

    #[test]
    fn test_ruleset_fingerprint_changes() {
        let mut engine = Engine::new(EngineOptions::default());
        let empty = engine.ruleset_fingerprint().to_string();
        engine.add_rule(warn_rule("a"));
        let one = engine.ruleset_fingerprint().to_string();
        assert_ne!(empty, one);
        assert_eq!(one, engine.ruleset_fingerprint());

        engine.remove_rule("a");
        assert_eq!(empty, engine.ruleset_fingerprint());
    }

    #[test]
    fn test_relative_root_reads_discovered_paths() {
        let files = MemoryFiles::new().with_file("proj/src/a.ts", "x");
        let mut engine = Engine::new(EngineOptions::new("proj"))
            .with_reader(files.clone())
            .with_discovery(files);
        engine.add_rule(warn_rule("w"));

        let results = engine.validate_files(&["**/*.ts".to_string()]).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file, PathBuf::from("src/a.ts"));
        assert!(results[0]
            .violations
            .iter()
            .all(|v| v.rule_id() != FILE_READ_ERROR));

        // Paths given relative to the root still resolve against it
        let single = engine.validate_file(Path::new("src/a.ts"));
        assert!(single.violations.iter().all(|v| v.rule_id() != FILE_READ_ERROR));
    }

    #[test]
    fn test_validate_files_in_batches() {
        let mut files = MemoryFiles::new();
        for i in 0..7 {
            files = files.with_file(format!("/p/src/f{}.ts", i), "x");
        }
        let mut engine = Engine::new(EngineOptions::new("/p").with_max_concurrency(3))
            .with_reader(files.clone())
            .with_discovery(files);
        engine.add_rule(warn_rule("w"));

        let results = engine
            .validate_files(&["**/*.ts".to_string()])
            .unwrap();
        assert_eq!(results.len(), 7);

        let stats = engine.stats();
        assert_eq!(stats.files_processed, 7);
        assert_eq!(stats.rules_executed, 7);
        assert_eq!(stats.count(Severity::Warning), 7);
    }

    #[test]
    fn test_validate_project_defaults() {
        let files = MemoryFiles::new()
            .with_file("/p/a.ts", "")
            .with_file("/p/b.jsx", "")
            .with_file("/p/c.py", "");
        let engine = memory_engine(files);

        assert_eq!(engine.validate_project(None).unwrap().len(), 2);
        let py = vec!["**/*.py".to_string()];
        assert_eq!(engine.validate_project(Some(&py)).unwrap().len(), 1);
    }

    #[test]
    fn test_stats_reset_per_pass() {
        let files = MemoryFiles::new().with_file("/p/a.ts", "");
        let mut engine = memory_engine(files);
        engine.add_rule(warn_rule("w"));

        let patterns = vec!["**/*.ts".to_string()];
        engine.validate_files(&patterns).unwrap();
        engine.validate_files(&patterns).unwrap();
        assert_eq!(engine.stats().files_processed, 1);
        assert_eq!(engine.stats().total_violations, 1);
    }
}
