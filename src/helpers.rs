//! Helper functions for writing rules
//!
//! Structural helpers (classes, methods, imports) are regex scans, not a parser.
//! They miss multi-line signatures and will also see declarations inside strings
//! and comments.

use crate::context::ValidationContext;
use crate::diagnostic::{Severity, Violation, ViolationError};
use crate::rule::PathPattern;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;

static CLASS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)\b(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)").unwrap()
});

/// `name(args) {` style members, optionally prefixed with modifiers
static METHOD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:(?:public|private|protected|static|async|readonly|override|abstract|get|set)\s+)*([A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*\([^)]*\)\s*(?::\s*[^{;=]+)?\{",
    )
    .unwrap()
});

static FUNCTION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)\b(?:function\*?|fn|def|func)\s+([A-Za-z_$][\w$]*)").unwrap()
});

static ARROW_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*=>")
        .unwrap()
});

static IMPORT_FROM_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)\b(?:import|export)\b[^'";]*?\bfrom\s*['"]([^'"]+)['"]"#).unwrap());

static IMPORT_BARE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*import\s*['"]([^'"]+)['"]"#).unwrap());

static REQUIRE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(?:require|import)\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap()
});

/// Identifiers that look like `name(...) {` but are control flow
const NOT_METHODS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "function", "else", "do", "with",
    "constructor",
];

/// A regex match located within multi-line text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMatch {
    /// Line number (1-based)
    pub line: usize,
    /// Column of the match start, in characters (1-based)
    pub column: usize,
    /// Matched text
    pub text: String,
}

/// Check if content contains a literal substring
pub fn contains_text(content: &str, needle: &str) -> bool {
    content.contains(needle)
}

/// Check if content matches a regex anywhere
pub fn matches_regex(content: &str, pattern: &Regex) -> bool {
    pattern.is_match(content)
}

/// Find every match of `pattern`, scanning each line independently
pub fn find_matches(content: &str, pattern: &Regex) -> Vec<TextMatch> {
    let mut matches = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        for m in pattern.find_iter(line) {
            matches.push(TextMatch {
                line: idx + 1,
                column: line[..m.start()].chars().count() + 1,
                text: m.as_str().to_string(),
            });
        }
    }
    matches
}

/// Check if a path matches any of the given patterns
pub fn matches_any(path: &Path, patterns: &[PathPattern]) -> bool {
    patterns.iter().any(|p| p.is_match(path))
}

/// Extract declared class names
pub fn extract_class_names(content: &str) -> Vec<String> {
    unique_captures(&[&CLASS_REGEX], content)
}

/// Extract method and function names
pub fn extract_method_names(content: &str) -> Vec<String> {
    unique_captures(&[&METHOD_REGEX, &FUNCTION_REGEX, &ARROW_REGEX], content)
        .into_iter()
        .filter(|name| !NOT_METHODS.contains(&name.as_str()))
        .collect()
}

/// Extract import module specifiers (`from '...'`, bare imports, `require(...)`)
pub fn extract_imports(content: &str) -> Vec<String> {
    unique_captures(
        &[&IMPORT_FROM_REGEX, &IMPORT_BARE_REGEX, &REQUIRE_REGEX],
        content,
    )
}

/// Check for a decorator or annotation by exact name (`@Name`)
pub fn has_decorator(content: &str, name: &str) -> bool {
    let pattern = format!(r"@{}\b", regex::escape(name));
    Regex::new(&pattern).is_ok_and(|re| re.is_match(content))
}

/// Check for an interface or type alias declaration by exact name
pub fn has_interface(content: &str, name: &str) -> bool {
    let pattern = format!(r"\b(?:interface|type)\s+{}\b", regex::escape(name));
    Regex::new(&pattern).is_ok_and(|re| re.is_match(content))
}

/// Optional parts of a violation built with [`create_violation`]
#[derive(Debug, Clone, Default)]
pub struct ViolationOptions {
    /// Severity (defaults to warning)
    pub severity: Option<Severity>,
    pub suggestion: Option<String>,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl ViolationOptions {
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn suggestion(mut self, suggestion: &str) -> Self {
        self.suggestion = Some(suggestion.to_string());
        self
    }

    pub fn position(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

/// Build a violation for the context's file
pub fn create_violation(
    ctx: &ValidationContext,
    rule_id: &str,
    message: &str,
    options: ViolationOptions,
) -> Result<Violation, ViolationError> {
    let mut violation = Violation::new(
        rule_id,
        options.severity.unwrap_or_default(),
        message,
        ctx.file_path(),
    )?;

    if let Some(suggestion) = &options.suggestion {
        violation = violation.with_suggestion(suggestion);
    }
    violation = match (options.line, options.column) {
        (Some(line), Some(column)) => violation.at(line, column),
        (Some(line), None) => violation.at_line(line),
        _ => violation,
    };

    Ok(violation)
}

fn unique_captures(patterns: &[&Regex], content: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut names = Vec::new();
    for re in patterns {
        for caps in re.captures_iter(content) {
            if let Some(name) = caps.get(1) {
                if seen.insert(name.as_str().to_string()) {
                    names.push(name.as_str().to_string());
                }
            }
        }
    }
    names
}
