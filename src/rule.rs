//! Rule definition and builder

use crate::context::ValidationContext;
use crate::diagnostic::{Severity, Violation};
use globset::{Glob, GlobMatcher};
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Default category for rules that don't set one
pub const DEFAULT_CATEGORY: &str = "general";

/// Signature of a rule's validation function
pub type ValidateFn = dyn Fn(&ValidationContext) -> anyhow::Result<Vec<Violation>> + Send + Sync;

/// Error building a rule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("rule is missing required field(s): {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("rule '{rule_id}' has invalid pattern '{pattern}': {message}")]
    InvalidPattern {
        rule_id: String,
        pattern: String,
        message: String,
    },
}

/// A path-matching pattern: a regex searched anywhere in the path, or a glob
#[derive(Debug, Clone)]
pub enum PathPattern {
    Regex(Regex),
    Glob { source: String, matcher: GlobMatcher },
}

impl PathPattern {
    /// Compile a regex pattern
    pub fn regex(pattern: &str) -> Result<Self, String> {
        Regex::new(pattern)
            .map(PathPattern::Regex)
            .map_err(|e| e.to_string())
    }

    /// Compile a glob pattern
    pub fn glob(pattern: &str) -> Result<Self, String> {
        Glob::new(pattern)
            .map(|g| PathPattern::Glob {
                source: pattern.to_string(),
                matcher: g.compile_matcher(),
            })
            .map_err(|e| e.to_string())
    }

    /// Match against a path, using `/` as the separator
    pub fn is_match(&self, path: &Path) -> bool {
        let normalized = path.to_string_lossy().replace('\\', "/");
        match self {
            PathPattern::Regex(re) => re.is_match(&normalized),
            PathPattern::Glob { matcher, .. } => matcher.is_match(normalized.as_str()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PathPattern::Regex(re) => re.as_str(),
            PathPattern::Glob { source, .. } => source,
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPattern::Regex(re) => write!(f, "/{}/", re.as_str()),
            PathPattern::Glob { source, .. } => write!(f, "{}", source),
        }
    }
}

/// A validation rule. Immutable once built; cheap to clone.
#[derive(Clone)]
pub struct Rule {
    id: String,
    name: String,
    description: String,
    severity: Severity,
    category: String,
    tags: BTreeSet<String>,
    file_patterns: Vec<PathPattern>,
    exclude_patterns: Vec<PathPattern>,
    validator: Arc<ValidateFn>,
}

impl Rule {
    /// Start building a rule
    pub fn builder() -> RuleBuilder {
        RuleBuilder::default()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn file_patterns(&self) -> &[PathPattern] {
        &self.file_patterns
    }

    pub fn exclude_patterns(&self) -> &[PathPattern] {
        &self.exclude_patterns
    }

    /// Whether this rule runs for `path`.
    ///
    /// Excludes win over includes; an empty include list matches every path.
    pub fn applies_to(&self, path: &Path) -> bool {
        if self.exclude_patterns.iter().any(|p| p.is_match(path)) {
            return false;
        }
        self.file_patterns.is_empty() || self.file_patterns.iter().any(|p| p.is_match(path))
    }

    /// Run the validation function. No error isolation happens here.
    pub fn check(&self, ctx: &ValidationContext) -> anyhow::Result<Vec<Violation>> {
        (self.validator)(ctx)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("severity", &self.severity)
            .field("category", &self.category)
            .field("tags", &self.tags)
            .field("file_patterns", &self.file_patterns)
            .field("exclude_patterns", &self.exclude_patterns)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
enum PatternSource {
    Regex(String),
    Glob(String),
}

impl PatternSource {
    fn compile(&self, rule_id: &str) -> Result<PathPattern, ConfigurationError> {
        let (pattern, compiled) = match self {
            PatternSource::Regex(p) => (p, PathPattern::regex(p)),
            PatternSource::Glob(p) => (p, PathPattern::glob(p)),
        };
        compiled.map_err(|message| ConfigurationError::InvalidPattern {
            rule_id: rule_id.to_string(),
            pattern: pattern.clone(),
            message,
        })
    }
}

/// Accumulates rule fields; [`RuleBuilder::validate`] produces the [`Rule`]
#[derive(Debug, Clone, Default)]
pub struct RuleBuilder {
    id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    severity: Option<Severity>,
    category: Option<String>,
    tags: BTreeSet<String>,
    file_patterns: Vec<PatternSource>,
    exclude_patterns: Vec<PatternSource>,
}

impl RuleBuilder {
    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    /// Add a tag
    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.insert(tag.to_string());
        self
    }

    /// Add several tags
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Append an include regex (searched anywhere in the path)
    pub fn file_pattern(mut self, pattern: &str) -> Self {
        self.file_patterns.push(PatternSource::Regex(pattern.to_string()));
        self
    }

    /// Append an include glob
    pub fn file_glob(mut self, pattern: &str) -> Self {
        self.file_patterns.push(PatternSource::Glob(pattern.to_string()));
        self
    }

    /// Append an exclude regex
    pub fn exclude_pattern(mut self, pattern: &str) -> Self {
        self.exclude_patterns.push(PatternSource::Regex(pattern.to_string()));
        self
    }

    /// Append an exclude glob
    pub fn exclude_glob(mut self, pattern: &str) -> Self {
        self.exclude_patterns.push(PatternSource::Glob(pattern.to_string()));
        self
    }

    /// Supply the validation function and build the rule.
    ///
    /// Fails if `id`, `name` or `description` is missing or blank, or if any pattern
    /// does not compile.
    pub fn validate<F>(self, validator: F) -> Result<Rule, ConfigurationError>
    where
        F: Fn(&ValidationContext) -> anyhow::Result<Vec<Violation>> + Send + Sync + 'static,
    {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

        let mut missing = Vec::new();
        if !present(&self.id) {
            missing.push("id");
        }
        if !present(&self.name) {
            missing.push("name");
        }
        if !present(&self.description) {
            missing.push("description");
        }
        if !missing.is_empty() {
            return Err(ConfigurationError::MissingFields(missing));
        }

        let id = self.id.unwrap_or_default();
        let file_patterns = self
            .file_patterns
            .iter()
            .map(|p| p.compile(&id))
            .collect::<Result<Vec<_>, _>>()?;
        let exclude_patterns = self
            .exclude_patterns
            .iter()
            .map(|p| p.compile(&id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Rule {
            id,
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            severity: self.severity.unwrap_or_default(),
            category: self
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            tags: self.tags,
            file_patterns,
            exclude_patterns,
            validator: Arc::new(validator),
        })
    }
}

/// Start building a rule
pub fn create_rule() -> RuleBuilder {
    RuleBuilder::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn noop(_: &ValidationContext) -> anyhow::Result<Vec<Violation>> {
        Ok(Vec::new())
    }

    #[test]
    fn test_builder_defaults() {
        let rule = create_rule()
            .id("no-console")
            .name("No console")
            .description("Disallow console logging")
            .validate(noop)
            .unwrap();

        assert_eq!(rule.id(), "no-console");
        assert_eq!(rule.severity(), Severity::Warning);
        assert_eq!(rule.category(), DEFAULT_CATEGORY);
        assert!(rule.file_patterns().is_empty());
        assert!(rule.tags().is_empty());
    }

    #[test]
    fn test_builder_missing_fields() {
        let err = create_rule().name("n").validate(noop).unwrap_err();
        assert_eq!(err, ConfigurationError::MissingFields(vec!["id", "description"]));
        assert_eq!(
            err.to_string(),
            "rule is missing required field(s): id, description"
        );

        let err = create_rule()
            .id(" ")
            .name("n")
            .description("d")
            .validate(noop)
            .unwrap_err();
        assert_eq!(err, ConfigurationError::MissingFields(vec!["id"]));
    }

    #[test]
    fn test_builder_invalid_pattern() {
        let err = create_rule()
            .id("r")
            .name("n")
            .description("d")
            .file_pattern("(unclosed")
            .validate(noop)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidPattern { ref pattern, .. } if pattern == "(unclosed"));
    }

    #[test]
    fn test_patterns_append() {
        let rule = create_rule()
            .id("r")
            .name("n")
            .description("d")
            .file_pattern(r"\.service\.ts$")
            .file_pattern(r"\.plugin\.ts$")
            .file_glob("**/*.controller.ts")
            .exclude_pattern(r"\.spec\.ts$")
            .tag("architecture")
            .tags(["nest", "architecture"])
            .validate(noop)
            .unwrap();

        assert_eq!(rule.file_patterns().len(), 3);
        assert_eq!(rule.exclude_patterns().len(), 1);
        assert_eq!(rule.tags().len(), 2);
        assert!(rule.has_tag("nest"));
    }

    #[test]
    fn test_applies_to() {
        let rule = create_rule()
            .id("r")
            .name("n")
            .description("d")
            .file_pattern(r"\.plugin\.ts$")
            .exclude_pattern(r"legacy/")
            .validate(noop)
            .unwrap();

        assert!(rule.applies_to(&PathBuf::from("src/foo.plugin.ts")));
        assert!(!rule.applies_to(&PathBuf::from("src/foo.service.ts")));
        assert!(!rule.applies_to(&PathBuf::from("src/legacy/foo.plugin.ts")));
    }

    #[test]
    fn test_applies_to_everything_by_default() {
        let rule = create_rule()
            .id("r")
            .name("n")
            .description("d")
            .validate(noop)
            .unwrap();

        for path in ["Makefile", "a b/c d.ts", "ünï/cødé", ".env", ""] {
            assert!(rule.applies_to(&PathBuf::from(path)), "{path}");
        }
    }

    #[test]
    fn test_glob_pattern_matching() {
        let pattern = PathPattern::glob("**/*.controller.ts").unwrap();
        assert!(pattern.is_match(&PathBuf::from("src/api/user.controller.ts")));
        assert!(!pattern.is_match(&PathBuf::from("src/api/user.service.ts")));
        assert_eq!(pattern.to_string(), "**/*.controller.ts");
        assert_eq!(PathPattern::regex("a$").unwrap().to_string(), "/a$/");
    }

    #[test]
    fn test_check_runs_validator() {
        let rule = create_rule()
            .id("needs-header")
            .name("Header")
            .description("Files need a license header")
            .severity(Severity::Error)
            .validate(|ctx| {
                if ctx.content().starts_with("// SPDX") {
                    return Ok(Vec::new());
                }
                Ok(vec![Violation::new(
                    "needs-header",
                    Severity::Error,
                    "missing header",
                    ctx.file_path(),
                )?])
            })
            .unwrap();

        let ctx = ValidationContext::new("a.ts", "export {}", ".");
        assert_eq!(rule.check(&ctx).unwrap().len(), 1);
        let ctx = ValidationContext::new("a.ts", "// SPDX-License\n", ".");
        assert!(rule.check(&ctx).unwrap().is_empty());
    }
}
