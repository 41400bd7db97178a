//! Output formatters for validation results

mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::config::{GroupBy, OutputFormat};
use crate::diagnostic::Severity;
use crate::engine::{EngineStats, ValidationResult};
use serde::Serialize;
use thiserror::Error;

/// Error rendering a report
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Output formatter trait
pub trait OutputFormatter: Send + Sync {
    /// Format a whole validation pass
    fn format(&self, results: &[ValidationResult], stats: &EngineStats) -> Result<String, OutputError>;
}

/// How results are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub format: OutputFormat,
    pub group_by: GroupBy,
    pub show_suggestions: bool,
    pub show_stats: bool,
    pub colored: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            group_by: GroupBy::Severity,
            show_suggestions: true,
            show_stats: false,
            colored: true,
        }
    }
}

/// Aggregate counts over a set of results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub files: usize,
    pub violations: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

impl Summary {
    pub fn from_results(results: &[ValidationResult]) -> Self {
        let mut summary = Self {
            files: results.len(),
            ..Self::default()
        };
        for violation in results.iter().flat_map(|r| &r.violations) {
            summary.violations += 1;
            match violation.severity() {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Info => summary.infos += 1,
            }
        }
        summary
    }

    /// True iff no error-severity violation exists
    pub fn passed(&self) -> bool {
        self.errors == 0
    }
}

/// Formatter for the requested output
pub fn formatter(options: &ReportOptions) -> Box<dyn OutputFormatter> {
    match options.format {
        OutputFormat::Text => Box::new(TextFormatter::from_options(options)),
        OutputFormat::Json => Box::new(JsonFormatter::new().pretty()),
    }
}

/// Render results and stats. Never mutates its inputs.
pub fn render(
    results: &[ValidationResult],
    stats: &EngineStats,
    options: &ReportOptions,
) -> Result<String, OutputError> {
    formatter(options).format(results, stats)
}
