//! Configuration system
//!
//! Reads configuration from:
//! - `.conformity.yaml` / `.conformity.yml` / `.conformity.json` (project-level)
//! - the same names in the home directory (user-level)

use crate::diagnostic::Severity;
use crate::engine::{EngineOptions, DEFAULT_EXCLUDES, DEFAULT_MAX_CONCURRENCY, DEFAULT_PATTERNS};
use crate::output::ReportOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file names, in lookup order
pub const CONFIG_FILE_NAMES: &[&str] = &[".conformity.yaml", ".conformity.yml", ".conformity.json"];

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Files validated concurrently (0 = one per CPU)
    pub max_concurrency: usize,

    /// Enable the result cache
    pub cache: bool,

    /// Cache directory
    pub cache_dir: Option<PathBuf>,

    /// Log rule failures
    pub verbose: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            cache: false,
            cache_dir: None,
            verbose: false,
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Color mode options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    /// Resolve against the terminal
    pub fn enabled(self) -> bool {
        match self {
            ColorMode::Auto => std::io::stdout().is_terminal(),
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

/// How the text report groups violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Severity,
    File,
}

impl std::str::FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "severity" => Ok(GroupBy::Severity),
            "file" => Ok(GroupBy::File),
            _ => Err(format!("Unknown grouping: {}", s)),
        }
    }
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format
    pub format: OutputFormat,

    /// Color mode
    pub color: ColorMode,

    /// Show suggestions
    pub suggestions: bool,

    /// Show statistics
    pub statistics: bool,

    /// Text report grouping
    pub group_by: GroupBy,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: ColorMode::Auto,
            suggestions: true,
            statistics: false,
            group_by: GroupBy::Severity,
        }
    }
}

/// File handling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Discovery patterns
    pub include: Vec<String>,

    /// Global exclusions
    pub exclude: Vec<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            include: DEFAULT_PATTERNS.iter().map(|s| s.to_string()).collect(),
            exclude: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Rule configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Declarative rule files, relative to the config file
    pub files: Vec<PathBuf>,

    /// Rule ids that are not registered
    pub disabled: Vec<String>,

    /// Severity overrides (rule_id -> severity)
    pub severity: HashMap<String, Severity>,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine settings
    pub engine: EngineConfig,

    /// File handling settings
    pub files: FilesConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Rule configuration
    pub rules: RulesConfig,

    /// Where this config was loaded from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Command-line values that override the config file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub patterns: Option<Vec<String>>,
    pub format: Option<OutputFormat>,
    pub group_by: Option<GroupBy>,
    pub verbose: bool,
    pub no_suggestions: bool,
    pub stats: bool,
    pub no_color: bool,
    pub cache: bool,
    pub jobs: Option<usize>,
    pub rule_files: Vec<PathBuf>,
}

impl Config {
    /// Create default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let mut config: Self = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown config file format: {}",
                    path.display()
                )))
            }
        };

        config.source = Some(path.to_path_buf());
        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load configuration from the project root, then the home directory
    pub fn load_default(project_root: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = find_config_file(project_root) {
            return Self::load(&path);
        }

        if let Some(home) = dirs::home_dir() {
            if let Some(path) = find_config_file(&home) {
                return Self::load(&path);
            }
        }

        Ok(Self::default())
    }

    /// Merge CLI arguments into configuration
    pub fn merge_cli(&mut self, cli: CliOverrides) {
        if let Some(patterns) = cli.patterns.filter(|p| !p.is_empty()) {
            self.files.include = patterns;
        }
        if let Some(format) = cli.format {
            self.output.format = format;
        }
        if let Some(group_by) = cli.group_by {
            self.output.group_by = group_by;
        }
        if let Some(jobs) = cli.jobs {
            self.engine.max_concurrency = jobs;
        }
        if cli.verbose {
            self.engine.verbose = true;
        }
        if cli.no_suggestions {
            self.output.suggestions = false;
        }
        if cli.stats {
            self.output.statistics = true;
        }
        if cli.no_color {
            self.output.color = ColorMode::Never;
        }
        if cli.cache {
            self.engine.cache = true;
        }
        // CLI rule files are relative to the working directory, not the config
        self.rules.files.extend(cli.rule_files.into_iter().map(|p| {
            if p.is_relative() {
                std::env::current_dir().map(|cwd| cwd.join(&p)).unwrap_or(p)
            } else {
                p
            }
        }));
    }

    /// Rule files resolved against the config file's directory
    pub fn rule_files(&self) -> Vec<PathBuf> {
        let base = self
            .source
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or(Path::new("."));
        self.rules
            .files
            .iter()
            .map(|p| if p.is_absolute() { p.clone() } else { base.join(p) })
            .collect()
    }

    /// Check if a rule is enabled
    pub fn is_rule_enabled(&self, rule_id: &str) -> bool {
        !self.rules.disabled.iter().any(|d| d == rule_id)
    }

    /// Get severity override for a rule
    pub fn severity_override(&self, rule_id: &str) -> Option<Severity> {
        self.rules.severity.get(rule_id).copied()
    }

    /// Effective concurrency (0 means one per CPU)
    pub fn max_concurrency(&self) -> usize {
        match self.engine.max_concurrency {
            0 => num_cpus::get().max(1),
            n => n,
        }
    }

    /// Engine options for a project root
    pub fn engine_options(&self, project_root: &Path) -> EngineOptions {
        EngineOptions::new(project_root)
            .with_max_concurrency(self.max_concurrency())
            .with_cache(self.engine.cache)
            .with_verbose(self.engine.verbose)
            .with_exclude_patterns(self.files.exclude.clone())
    }

    /// Report options for the configured output
    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            format: self.output.format,
            group_by: self.output.group_by,
            show_suggestions: self.output.suggestions,
            show_stats: self.output.statistics,
            colored: self.output.color.enabled(),
        }
    }
}

fn find_config_file(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.engine.max_concurrency, 10);
        assert_eq!(config.output.format, OutputFormat::Text);
        assert!(config.output.suggestions);
        assert!(!config.output.statistics);
        assert_eq!(config.files.include.len(), 4);
        assert!(config.files.exclude.contains(&"**/*.d.ts".to_string()));
    }

    #[test]
    fn test_load_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".conformity.yaml");
        fs::write(
            &path,
            r#"
engine:
  max_concurrency: 4
  cache: true
files:
  include: ["src/**/*.ts"]
output:
  format: json
  group_by: file
rules:
  files: [rules/architecture.yaml]
  disabled: [no-console]
  severity:
    no-any: error
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.engine.max_concurrency, 4);
        assert!(config.engine.cache);
        assert_eq!(config.files.include, vec!["src/**/*.ts"]);
        // Unset sections keep their defaults
        assert_eq!(config.files.exclude.len(), DEFAULT_EXCLUDES.len());
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.output.group_by, GroupBy::File);
        assert!(!config.is_rule_enabled("no-console"));
        assert!(config.is_rule_enabled("no-any"));
        assert_eq!(config.severity_override("no-any"), Some(Severity::Error));
        assert_eq!(
            config.rule_files(),
            vec![temp.path().join("rules/architecture.yaml")]
        );
    }

    #[test]
    fn test_load_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".conformity.json");
        fs::write(&path, r#"{"output": {"color": "never", "statistics": true}}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.output.color, ColorMode::Never);
        assert!(config.output.statistics);
        assert!(!config.report_options().colored);
    }

    #[test]
    fn test_unknown_extension() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("conformity.toml");
        fs::write(&path, "").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_default_from_project_root() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(".conformity.yml"),
            "engine:\n  verbose: true\n",
        )
        .unwrap();

        let config = Config::load_default(temp.path()).unwrap();
        assert!(config.engine.verbose);
        assert_eq!(config.source, Some(temp.path().join(".conformity.yml")));
    }

    #[test]
    fn test_merge_cli() {
        let mut config = Config::default();
        config.merge_cli(CliOverrides {
            patterns: Some(vec!["lib/**/*.js".to_string()]),
            format: Some(OutputFormat::Json),
            jobs: Some(2),
            no_suggestions: true,
            stats: true,
            no_color: true,
            ..CliOverrides::default()
        });

        assert_eq!(config.files.include, vec!["lib/**/*.js"]);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.max_concurrency(), 2);
        assert!(!config.output.suggestions);
        assert!(config.output.statistics);
        assert_eq!(config.output.color, ColorMode::Never);
    }

    #[test]
    fn test_empty_cli_patterns_keep_config() {
        let mut config = Config::default();
        config.merge_cli(CliOverrides {
            patterns: Some(Vec::new()),
            ..CliOverrides::default()
        });
        assert_eq!(config.files.include.len(), DEFAULT_PATTERNS.len());
    }

    #[test]
    fn test_zero_concurrency_uses_cpus() {
        let mut config = Config::default();
        config.engine.max_concurrency = 0;
        assert!(config.max_concurrency() >= 1);

        let options = config.engine_options(Path::new("/repo"));
        assert_eq!(options.project_root, PathBuf::from("/repo"));
        assert!(options.max_concurrency >= 1);
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("sarif".parse::<OutputFormat>().is_err());
        assert_eq!("file".parse::<GroupBy>(), Ok(GroupBy::File));
    }
}
