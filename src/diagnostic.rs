//! Violation types for validation results

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Severity level for violations
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,
    /// Warning - convention not followed
    #[default]
    Warning,
    /// Error - the file fails validation
    Error,
}

impl Severity {
    /// All severities, most severe first
    pub const ALL: [Severity; 3] = [Severity::Error, Severity::Warning, Severity::Info];
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Error parsing a severity name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown severity '{0}' (expected error, warning or info)")]
pub struct ParseSeverityError(pub String);

impl std::str::FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" | "hint" | "note" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" | "err" => Ok(Severity::Error),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

/// Error constructing a violation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViolationError {
    #[error("violation rule id must not be empty")]
    EmptyRuleId,
}

/// A single finding reported by a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Rule ID that produced this violation
    rule_id: String,
    /// Severity level
    severity: Severity,
    /// Human-readable message
    message: String,
    /// File path or display name
    file: PathBuf,
    /// Suggested remediation (never applied automatically)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    suggestion: Option<String>,
    /// Line number (1-based)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    line: Option<usize>,
    /// Column number (1-based)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    column: Option<usize>,
}

impl Violation {
    /// Create a new violation. The rule id must be non-empty.
    pub fn new(
        rule_id: &str,
        severity: Severity,
        message: &str,
        file: impl AsRef<Path>,
    ) -> Result<Self, ViolationError> {
        if rule_id.trim().is_empty() {
            return Err(ViolationError::EmptyRuleId);
        }
        Ok(Self {
            rule_id: rule_id.to_string(),
            severity,
            message: message.to_string(),
            file: file.as_ref().to_path_buf(),
            suggestion: None,
            line: None,
            column: None,
        })
    }

    /// Engine-produced violation with a reserved, non-empty rule id
    pub(crate) fn reserved(rule_id: &'static str, message: &str, file: &Path) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            severity: Severity::Error,
            message: message.to_string(),
            file: file.to_path_buf(),
            suggestion: None,
            line: None,
            column: None,
        }
    }

    /// Attach a suggestion
    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.suggestion = Some(suggestion.to_string());
        self
    }

    /// Attach a 1-based position
    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Attach a 1-based line only
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }

    pub fn line(&self) -> Option<usize> {
        self.line
    }

    pub fn column(&self) -> Option<usize> {
        self.column
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Check if this violation carries a suggestion
    pub fn has_suggestion(&self) -> bool {
        self.suggestion.is_some()
    }

    /// Format as `file:line:column`, omitting unknown parts
    pub fn location(&self) -> String {
        match (self.line, self.column) {
            (Some(line), Some(column)) => format!("{}:{}:{}", self.file.display(), line, column),
            (Some(line), None) => format!("{}:{}", self.file.display(), line),
            _ => self.file.display().to_string(),
        }
    }
}
