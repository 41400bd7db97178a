//! Conformity - rule-based validation for source conventions
//!
//! Rules are functions over a per-file [`ValidationContext`]; the engine discovers
//! files, runs every applicable rule and aggregates violations.
//!
//! # Architecture
//!
//! ```text
//! CLI/API -> Engine -> FileDiscovery/SourceReader -> ValidationContext -> Rule
//! ```
//!
//! Each rule runs in its own error boundary: a rule that fails or panics is logged
//! and skipped, and never affects other rules or other files.
//!
//! # Writing rules
//!
//! ```no_run
//! use conformity::{create_rule, create_violation, Engine, EngineOptions, ViolationOptions};
//! use conformity::Severity;
//!
//! let rule = create_rule()
//!     .id("plugin-base-class")
//!     .name("Plugin base class")
//!     .description("Plugins must extend BaseActionPlugin")
//!     .severity(Severity::Error)
//!     .file_pattern(r"\.plugin\.ts$")
//!     .validate(|ctx| {
//!         if ctx.contains("extends BaseActionPlugin") {
//!             return Ok(Vec::new());
//!         }
//!         let options = ViolationOptions::default()
//!             .severity(Severity::Error)
//!             .suggestion("extend BaseActionPlugin");
//!         Ok(vec![create_violation(ctx, "plugin-base-class", "Plugin must extend BaseActionPlugin", options)?])
//!     })
//!     .expect("valid rule");
//!
//! let mut engine = Engine::new(EngineOptions::new("."));
//! engine.add_rule(rule);
//! let results = engine.validate_project(None).expect("discovery");
//! ```
//!
//! Rules can also be declared in YAML/JSON files; see [`ruleset`].

pub mod cache;
pub mod config;
pub mod context;
pub mod diagnostic;
pub mod discovery;
pub mod engine;
pub mod helpers;
pub mod output;
pub mod rule;
pub mod ruleset;

// Re-export main types
pub use cache::ResultCache;
pub use config::{Config, ConfigError};
pub use context::{Language, ValidationContext};
pub use diagnostic::{Severity, Violation, ViolationError};
pub use discovery::{DiscoveryError, FileDiscovery, FsReader, GlobDiscovery, MemoryFiles, SourceReader};
pub use engine::{Engine, EngineOptions, EngineStats, RuleExecutionError, ValidationResult};
pub use helpers::{create_violation, ViolationOptions};
pub use output::{OutputError, OutputFormatter, ReportOptions, Summary};
pub use rule::{create_rule, ConfigurationError, PathPattern, Rule, RuleBuilder};
pub use ruleset::{load_rules, RuleDefinition, RuleFile, RuleFileError};
