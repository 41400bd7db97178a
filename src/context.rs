//! Per-file validation context
//!
//! A [`ValidationContext`] is built once per file per validation pass and handed to
//! every applicable rule. Structural queries go through this type so that the regex
//! heuristics in [`crate::helpers`] can be replaced by a real parser without touching
//! rule code.

use crate::helpers;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Source language, detected from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Rust,
    Go,
    Java,
    Kotlin,
    CSharp,
    Ruby,
    Php,
    Swift,
    C,
    Cpp,
    Json,
    Yaml,
    Markdown,
    Unknown,
}

impl Language {
    /// Detect language from a path. Unmapped or missing extensions yield `Unknown`.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| Self::from_extension(&e.to_lowercase()))
            .unwrap_or(Language::Unknown)
    }

    /// Look up a lowercase extension (without the dot)
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "ts" | "tsx" | "mts" | "cts" => Language::TypeScript,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "py" => Language::Python,
            "rs" => Language::Rust,
            "go" => Language::Go,
            "java" => Language::Java,
            "kt" | "kts" => Language::Kotlin,
            "cs" => Language::CSharp,
            "rb" => Language::Ruby,
            "php" => Language::Php,
            "swift" => Language::Swift,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" => Language::Cpp,
            "json" => Language::Json,
            "yaml" | "yml" => Language::Yaml,
            "md" => Language::Markdown,
            _ => Language::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Rust => "rust",
            Language::Go => "go",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Swift => "swift",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Markdown => "markdown",
            Language::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of one file that rules validate against
#[derive(Debug)]
pub struct ValidationContext {
    content: String,
    file_path: PathBuf,
    project_root: PathBuf,
    language: Language,
    classes: OnceLock<Vec<String>>,
    methods: OnceLock<Vec<String>>,
    imports: OnceLock<Vec<String>>,
}

impl ValidationContext {
    /// Build a context from raw content. Never fails.
    pub fn new(
        file_path: impl Into<PathBuf>,
        content: impl Into<String>,
        project_root: impl Into<PathBuf>,
    ) -> Self {
        let file_path = file_path.into();
        let language = Language::from_path(&file_path);
        Self {
            content: content.into(),
            file_path,
            project_root: project_root.into(),
            language,
            classes: OnceLock::new(),
            methods: OnceLock::new(),
            imports: OnceLock::new(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Source lines (for rules that report positions)
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.content.lines()
    }

    /// Literal substring test
    pub fn contains(&self, needle: &str) -> bool {
        helpers::contains_text(&self.content, needle)
    }

    /// Regex test
    pub fn matches(&self, pattern: &Regex) -> bool {
        helpers::matches_regex(&self.content, pattern)
    }

    /// All located matches of a regex
    pub fn find_all(&self, pattern: &Regex) -> Vec<helpers::TextMatch> {
        helpers::find_matches(&self.content, pattern)
    }

    /// Class names declared in the file
    pub fn classes(&self) -> &[String] {
        self.classes
            .get_or_init(|| helpers::extract_class_names(&self.content))
    }

    /// Method and function names declared in the file
    pub fn methods(&self) -> &[String] {
        self.methods
            .get_or_init(|| helpers::extract_method_names(&self.content))
    }

    /// Module specifiers imported by the file
    pub fn imports(&self) -> &[String] {
        self.imports
            .get_or_init(|| helpers::extract_imports(&self.content))
    }

    pub fn has_class(&self, pattern: &Regex) -> bool {
        self.classes().iter().any(|c| pattern.is_match(c))
    }

    pub fn has_method(&self, pattern: &Regex) -> bool {
        self.methods().iter().any(|m| pattern.is_match(m))
    }

    pub fn has_import(&self, pattern: &Regex) -> bool {
        self.imports().iter().any(|i| pattern.is_match(i))
    }

    /// Decorator or annotation by exact name, e.g. `Injectable` for `@Injectable()`
    pub fn has_decorator(&self, name: &str) -> bool {
        helpers::has_decorator(&self.content, name)
    }

    /// Interface or type alias by exact name
    pub fn has_interface(&self, name: &str) -> bool {
        helpers::has_interface(&self.content, name)
    }

    /// File path resolved against the project root
    pub fn absolute_path(&self) -> PathBuf {
        if self.file_path.is_absolute() {
            self.file_path.clone()
        } else {
            self.project_root.join(&self.file_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_detection() {
        assert_eq!(Language::from_path(Path::new("a.ts")), Language::TypeScript);
        assert_eq!(Language::from_path(Path::new("A.TSX")), Language::TypeScript);
        assert_eq!(Language::from_path(Path::new("a.mjs")), Language::JavaScript);
        assert_eq!(Language::from_path(Path::new("lib.rs")), Language::Rust);
        assert_eq!(Language::from_path(Path::new("Makefile")), Language::Unknown);
        assert_eq!(Language::from_path(Path::new("a.weird")), Language::Unknown);
        assert_eq!(Language::from_path(Path::new(".gitignore")), Language::Unknown);
    }

    #[test]
    fn test_language_display() {
        assert_eq!(Language::CSharp.to_string(), "csharp");
        assert_eq!(Language::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_context_queries() {
        let ctx = ValidationContext::new(
            "src/foo.plugin.ts",
            "import { BaseActionPlugin } from '../core/plugin';\n\
             @Plugin()\n\
             export class FooPlugin extends BaseActionPlugin {\n\
             \x20 execute(input: Input) {\n\
             \x20 }\n\
             }\n",
            ".",
        );

        assert_eq!(ctx.language(), Language::TypeScript);
        assert!(ctx.contains("extends BaseActionPlugin"));
        assert!(ctx.has_class(&Regex::new(r"Plugin$").unwrap()));
        assert!(ctx.has_method(&Regex::new(r"^execute$").unwrap()));
        assert!(ctx.has_import(&Regex::new(r"core/plugin").unwrap()));
        assert!(ctx.has_decorator("Plugin"));
        assert!(!ctx.has_interface("Input"));
        assert_eq!(ctx.classes(), ["FooPlugin".to_string()]);
    }

    #[test]
    fn test_absolute_path() {
        let ctx = ValidationContext::new("src/a.ts", "", "/repo");
        assert_eq!(ctx.absolute_path(), PathBuf::from("/repo/src/a.ts"));

        let ctx = ValidationContext::new("/elsewhere/a.ts", "", "/repo");
        assert_eq!(ctx.absolute_path(), PathBuf::from("/elsewhere/a.ts"));
    }

    #[test]
    fn test_find_all_through_context() {
        let ctx = ValidationContext::new("a.js", "a\nconsole.log(1)\n", ".");
        let hits = ctx.find_all(&Regex::new(r"console\.\w+").unwrap());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].line, 2);
    }
}
