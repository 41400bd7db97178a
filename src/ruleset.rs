//! Declarative rule files
//!
//! A rule file is YAML or JSON:
//!
//! ```yaml
//! version: "1"
//! rules:
//!   - id: no-console
//!     name: No console
//!     description: Use the project logger instead of console
//!     severity: warning
//!     files: ['\.ts$']
//!     exclude: ['\.spec\.ts$']
//!     forbid: 'console\.(log|debug)'
//!     suggestion: Use the logger
//! ```
//!
//! Each definition carries exactly one check (`forbid`, `require`, `require_class`,
//! `require_import`, `require_decorator`) and is compiled through [`RuleBuilder`].

use crate::context::ValidationContext;
use crate::diagnostic::{Severity, Violation};
use crate::helpers::{create_violation, ViolationOptions};
use crate::rule::{create_rule, ConfigurationError, Rule, RuleBuilder};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error loading a rule file
#[derive(Debug, Error)]
pub enum RuleFileError {
    #[error("failed to read rule file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("invalid rule '{rule_id}' in {file}: {message}")]
    Invalid {
        file: String,
        rule_id: String,
        message: String,
    },

    #[error("in {file}: {source}")]
    Rule {
        file: String,
        #[source]
        source: ConfigurationError,
    },
}

/// Rule file format (for loading from YAML/JSON)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleFile {
    /// File format version
    #[serde(default)]
    pub version: Option<String>,

    /// Rules defined in this file
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

/// One declarative rule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleDefinition {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub severity: Option<Severity>,
    pub category: Option<String>,
    pub tags: Vec<String>,

    /// Include regexes
    pub files: Vec<String>,
    /// Include globs
    pub files_glob: Vec<String>,
    /// Exclude regexes
    pub exclude: Vec<String>,
    /// Exclude globs
    pub exclude_glob: Vec<String>,

    /// Violation message (a default is derived from the check)
    pub message: Option<String>,
    pub suggestion: Option<String>,

    /// One violation per match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forbid: Option<String>,
    /// One violation when nothing matches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_import: Option<String>,
    /// Decorator name, without `@`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_decorator: Option<String>,
}

/// The compiled check of a definition
#[derive(Debug, Clone)]
enum Check {
    Forbid(Regex),
    Require(Regex),
    RequireClass(Regex),
    RequireImport(Regex),
    RequireDecorator(String),
}

impl Check {
    fn default_message(&self) -> String {
        match self {
            Check::Forbid(re) => format!("Forbidden pattern '{}' found", re.as_str()),
            Check::Require(re) => format!("Required pattern '{}' not found", re.as_str()),
            Check::RequireClass(re) => format!("No class matching '{}'", re.as_str()),
            Check::RequireImport(re) => format!("No import matching '{}'", re.as_str()),
            Check::RequireDecorator(name) => format!("Missing @{} decorator", name),
        }
    }

    /// Positions of offending matches, or `None` when the file passes
    fn run(&self, ctx: &ValidationContext) -> Vec<Option<(usize, usize)>> {
        match self {
            Check::Forbid(re) => ctx
                .find_all(re)
                .into_iter()
                .map(|m| Some((m.line, m.column)))
                .collect(),
            Check::Require(re) if !ctx.matches(re) => vec![None],
            Check::RequireClass(re) if !ctx.has_class(re) => vec![None],
            Check::RequireImport(re) if !ctx.has_import(re) => vec![None],
            Check::RequireDecorator(name) if !ctx.has_decorator(name) => vec![None],
            _ => Vec::new(),
        }
    }
}

/// Keys that select a definition's check
const CHECK_KEYS: &str = "forbid, require, require_class, require_import, require_decorator";

impl RuleDefinition {
    fn check(&self, file: &str) -> Result<Check, RuleFileError> {
        let mut checks = Vec::new();
        let regex = |pattern: &String| {
            Regex::new(pattern).map_err(|e| RuleFileError::Rule {
                file: file.to_string(),
                source: ConfigurationError::InvalidPattern {
                    rule_id: self.id.clone(),
                    pattern: pattern.clone(),
                    message: e.to_string(),
                },
            })
        };

        if let Some(p) = &self.forbid {
            checks.push(Check::Forbid(regex(p)?));
        }
        if let Some(p) = &self.require {
            checks.push(Check::Require(regex(p)?));
        }
        if let Some(p) = &self.require_class {
            checks.push(Check::RequireClass(regex(p)?));
        }
        if let Some(p) = &self.require_import {
            checks.push(Check::RequireImport(regex(p)?));
        }
        if let Some(name) = &self.require_decorator {
            checks.push(Check::RequireDecorator(
                name.trim_start_matches('@').to_string(),
            ));
        }

        let message = match checks.len() {
            1 => return Ok(checks.remove(0)),
            0 => format!("no check given; expected one of {}", CHECK_KEYS),
            n => format!("{} checks given; expected exactly one of {}", n, CHECK_KEYS),
        };
        Err(RuleFileError::Invalid {
            file: file.to_string(),
            rule_id: self.id.clone(),
            message,
        })
    }

    fn builder(&self, severity: Severity) -> RuleBuilder {
        let mut builder = create_rule()
            .id(&self.id)
            .name(self.name.as_deref().unwrap_or_default())
            .description(self.description.as_deref().unwrap_or_default())
            .severity(severity)
            .tags(self.tags.iter().cloned());

        if let Some(category) = &self.category {
            builder = builder.category(category);
        }
        for p in &self.files {
            builder = builder.file_pattern(p);
        }
        for p in &self.files_glob {
            builder = builder.file_glob(p);
        }
        for p in &self.exclude {
            builder = builder.exclude_pattern(p);
        }
        for p in &self.exclude_glob {
            builder = builder.exclude_glob(p);
        }
        builder
    }

    /// Compile into a [`Rule`]. All builder checks apply; `file` names the
    /// source in errors.
    pub fn compile(&self, file: &str) -> Result<Rule, RuleFileError> {
        let check = self.check(file)?;
        let severity = self.severity.unwrap_or_default();
        let builder = self.builder(severity);

        let rule_id = self.id.clone();
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| check.default_message());
        let suggestion = self.suggestion.clone();

        let rule = builder.validate(move |ctx| {
            check
                .run(ctx)
                .into_iter()
                .map(|position| {
                    let mut options = ViolationOptions::default().severity(severity);
                    if let Some(s) = &suggestion {
                        options = options.suggestion(s);
                    }
                    if let Some((line, column)) = position {
                        options = options.position(line, column);
                    }
                    create_violation(ctx, &rule_id, &message, options).map_err(Into::into)
                })
                .collect::<anyhow::Result<Vec<Violation>>>()
        });
        rule.map_err(|source| RuleFileError::Rule {
            file: file.to_string(),
            source,
        })
    }
}

impl RuleFile {
    /// Parse rule file content; `name` selects the format by extension
    pub fn parse(name: &Path, content: &str) -> Result<Self, RuleFileError> {
        let file = name.display().to_string();
        let ext = name.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yaml" | "yml" => serde_yaml::from_str(content).map_err(|e| RuleFileError::Parse {
                file,
                message: e.to_string(),
            }),
            "json" => serde_json::from_str(content).map_err(|e| RuleFileError::Parse {
                file,
                message: e.to_string(),
            }),
            _ => Err(RuleFileError::Parse {
                file,
                message: format!("unsupported rule file format: {}", ext),
            }),
        }
    }

    /// Load a rule file from disk
    pub fn load(path: &Path) -> Result<Self, RuleFileError> {
        let content = std::fs::read_to_string(path).map_err(|source| RuleFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }

    /// Apply per-rule severity overrides
    pub fn override_severities(&mut self, overrides: &HashMap<String, Severity>) {
        for rule in &mut self.rules {
            if let Some(severity) = overrides.get(&rule.id) {
                rule.severity = Some(*severity);
            }
        }
    }

    /// Compile every definition, failing on the first bad one
    pub fn compile(&self, source: &Path) -> Result<Vec<Rule>, RuleFileError> {
        let file = source.display().to_string();
        self.rules.iter().map(|def| def.compile(&file)).collect()
    }
}

/// Load and compile a rule file with severity overrides applied
pub fn load_rules(
    path: &Path,
    overrides: &HashMap<String, Severity>,
) -> Result<Vec<Rule>, RuleFileError> {
    let mut file = RuleFile::load(path)?;
    file.override_severities(overrides);
    let rules = file.compile(path)?;
    log::debug!("loaded {} rule(s) from {}", rules.len(), path.display());
    Ok(rules)
}
