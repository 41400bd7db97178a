//! Human-readable text output formatter

use super::{OutputError, OutputFormatter, ReportOptions, Summary};
use crate::config::GroupBy;
use crate::diagnostic::{Severity, Violation};
use crate::engine::{EngineStats, ValidationResult};
use colored::*;
use std::time::Duration;

/// Text formatter with optional color support
pub struct TextFormatter {
    /// Enable colored output
    pub colored: bool,

    /// Group violations by severity or by file
    pub group_by: GroupBy,

    /// Show suggestions
    pub show_suggestions: bool,

    /// Show statistics
    pub show_stats: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::from_options(&ReportOptions::default())
    }
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(options: &ReportOptions) -> Self {
        Self {
            colored: options.colored,
            group_by: options.group_by,
            show_suggestions: options.show_suggestions,
            show_stats: options.show_stats,
        }
    }

    /// Disable colors
    pub fn without_color(mut self) -> Self {
        self.colored = false;
        self
    }

    fn paint(&self, text: &str, severity: Severity) -> String {
        if !self.colored {
            return text.to_string();
        }
        match severity {
            Severity::Error => text.red().bold().to_string(),
            Severity::Warning => text.yellow().bold().to_string(),
            Severity::Info => text.blue().to_string(),
        }
    }

    fn rule_id(&self, violation: &Violation) -> String {
        if self.colored {
            violation.rule_id().cyan().to_string()
        } else {
            violation.rule_id().to_string()
        }
    }

    fn format_suggestion(&self, output: &mut String, violation: &Violation) {
        if !self.show_suggestions {
            return;
        }
        if let Some(suggestion) = violation.suggestion() {
            let marker = if self.colored {
                "=".green().to_string()
            } else {
                "=".to_string()
            };
            output.push_str(&format!("      {} suggestion: {}\n", marker, suggestion));
        }
    }

    fn format_summary(&self, output: &mut String, summary: &Summary) {
        output.push_str(&format!(
            "{} {} checked, {} {}",
            summary.files,
            plural(summary.files, "file", "files"),
            summary.violations,
            plural(summary.violations, "violation", "violations"),
        ));

        let mut counts = Vec::new();
        for (count, severity, one, many) in [
            (summary.errors, Severity::Error, "error", "errors"),
            (summary.warnings, Severity::Warning, "warning", "warnings"),
            (summary.infos, Severity::Info, "info", "infos"),
        ] {
            if count > 0 {
                counts.push(self.paint(&format!("{} {}", count, plural(count, one, many)), severity));
            }
        }
        if !counts.is_empty() {
            output.push_str(&format!(": {}", counts.join(", ")));
        }
        output.push('\n');
    }

    fn format_by_severity(&self, output: &mut String, results: &[ValidationResult]) {
        for severity in Severity::ALL {
            let violations: Vec<&Violation> = results
                .iter()
                .flat_map(|r| &r.violations)
                .filter(|v| v.severity() == severity)
                .collect();
            if violations.is_empty() {
                continue;
            }

            let title = format!("{} ({})", heading(severity), violations.len());
            output.push_str(&format!("\n{}\n", self.paint(&title, severity)));
            for violation in violations {
                output.push_str(&format!(
                    "  {} [{}] {}\n",
                    location(violation),
                    self.rule_id(violation),
                    violation.message()
                ));
                self.format_suggestion(output, violation);
            }
        }
    }

    fn format_by_file(&self, output: &mut String, results: &[ValidationResult]) {
        for result in results.iter().filter(|r| !r.violations.is_empty()) {
            let file = result.file.display().to_string();
            if self.colored {
                output.push_str(&format!("\n{}\n", file.underline()));
            } else {
                output.push_str(&format!("\n{}\n", file));
            }

            for violation in &result.violations {
                let position = match (violation.line(), violation.column()) {
                    (Some(line), Some(column)) => format!("{}:{}", line, column),
                    (Some(line), None) => line.to_string(),
                    _ => "-".to_string(),
                };
                output.push_str(&format!(
                    "  {:>7}  {}: [{}] {}\n",
                    position,
                    self.paint(&violation.severity().to_string(), violation.severity()),
                    self.rule_id(violation),
                    violation.message()
                ));
                self.format_suggestion(output, violation);
            }
        }
    }

    fn format_stats(&self, output: &mut String, stats: &EngineStats) {
        let title = if self.colored {
            "Statistics".bold().to_string()
        } else {
            "Statistics".to_string()
        };
        output.push_str(&format!("\n{}\n", title));
        output.push_str(&format!("  Files processed:  {}\n", stats.files_processed));
        output.push_str(&format!("  Rules executed:   {}\n", stats.rules_executed));
        output.push_str(&format!("  Violations:       {}\n", stats.total_violations));
        for severity in Severity::ALL {
            output.push_str(&format!(
                "    {:<8} {}\n",
                format!("{}:", severity),
                stats.count(severity)
            ));
        }
        output.push_str(&format!("  Execution time:   {}\n", millis(stats.execution_time)));
        output.push_str(&format!(
            "  Average per file: {}\n",
            millis(stats.average_file_time)
        ));
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, results: &[ValidationResult], stats: &EngineStats) -> Result<String, OutputError> {
        let mut output = String::new();
        let summary = Summary::from_results(results);

        if summary.violations == 0 {
            let line = format!(
                "No violations found in {} {}",
                summary.files,
                plural(summary.files, "file", "files")
            );
            if self.colored {
                output.push_str(&format!("{}\n", line.green()));
            } else {
                output.push_str(&format!("{}\n", line));
            }
        } else {
            self.format_summary(&mut output, &summary);
            match self.group_by {
                GroupBy::Severity => self.format_by_severity(&mut output, results),
                GroupBy::File => self.format_by_file(&mut output, results),
            }
        }

        if self.show_stats {
            self.format_stats(&mut output, stats);
        }

        Ok(output)
    }
}

fn heading(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "Errors",
        Severity::Warning => "Warnings",
        Severity::Info => "Info",
    }
}

/// `file:line`, or just `file` when the line is unknown
fn location(violation: &Violation) -> String {
    match violation.line() {
        Some(line) => format!("{}:{}", violation.file().display(), line),
        None => violation.file().display().to_string(),
    }
}

fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 {
        one
    } else {
        many
    }
}

fn millis(duration: Duration) -> String {
    format!("{:.2}ms", duration.as_secs_f64() * 1000.0)
}
