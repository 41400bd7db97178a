//! JSON output formatter

use super::{OutputError, OutputFormatter, Summary};
use crate::engine::{EngineStats, ValidationResult};
use serde::Serialize;

/// JSON formatter for machine-readable output
#[derive(Default)]
pub struct JsonFormatter {
    /// Pretty print with indentation
    pub pretty: bool,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    summary: Summary,
    results: &'a [ValidationResult],
    stats: &'a EngineStats,
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, results: &[ValidationResult], stats: &EngineStats) -> Result<String, OutputError> {
        let output = JsonOutput {
            summary: Summary::from_results(results),
            results,
            stats,
        };

        let mut json = if self.pretty {
            serde_json::to_string_pretty(&output)?
        } else {
            serde_json::to_string(&output)?
        };
        json.push('\n');
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{Severity, Violation};
    use std::time::Duration;

    #[test]
    fn test_json_format_results() {
        let results = vec![ValidationResult::new(
            "src/a.ts".into(),
            vec![Violation::new("no-console", Severity::Error, "Console call", "src/a.ts")
                .unwrap()
                .at(2, 1)],
            Duration::ZERO,
        )];
        let stats = EngineStats {
            files_processed: 1,
            ..EngineStats::default()
        };

        let output = JsonFormatter::new().format(&results, &stats).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["summary"]["files"], 1);
        assert_eq!(value["summary"]["errors"], 1);
        assert_eq!(value["results"][0]["file"], "src/a.ts");
        assert_eq!(value["results"][0]["is_valid"], false);
        assert_eq!(value["results"][0]["violations"][0]["rule_id"], "no-console");
        assert_eq!(value["results"][0]["violations"][0]["severity"], "error");
        assert_eq!(value["results"][0]["violations"][0]["line"], 2);
        assert!(value["results"][0]["violations"][0].get("suggestion").is_none());
        assert_eq!(value["stats"]["files_processed"], 1);
        assert_eq!(value["stats"]["violations_by_severity"]["warning"], 0);
    }

    #[test]
    fn test_json_pretty() {
        let output = JsonFormatter::new()
            .pretty()
            .format(&[], &EngineStats::default())
            .unwrap();
        assert!(output.trim_end().contains('\n'));
    }

    #[cfg(unix)]
    #[test]
    fn test_unserializable_path_is_an_error() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;
        use std::path::PathBuf;

        let file = PathBuf::from(OsStr::from_bytes(b"src/\xff.ts"));
        let results = vec![ValidationResult::new(file, Vec::new(), Duration::ZERO)];

        let err = JsonFormatter::new()
            .format(&results, &EngineStats::default())
            .unwrap_err();
        assert!(matches!(err, OutputError::Serialize(_)));
    }
}
