//! Conformity CLI - validate a project against its convention rules

use anyhow::Context;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use conformity::cache::{default_cache_path, ResultCache};
use conformity::config::{CliOverrides, Config, GroupBy, OutputFormat};
use conformity::output::Summary;
use conformity::ruleset::load_rules;
use conformity::{Engine, Rule};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "conformity",
    version,
    about = "Rule-based validation of source conventions",
    long_about = "Validates a project's source files against convention rules declared in \
                  YAML/JSON rule files and reports violations with suggestions."
)]
struct Cli {
    /// Project root
    #[arg(default_value = ".")]
    project: PathBuf,

    /// File patterns to validate (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    patterns: Option<Vec<String>>,

    /// Enable verbose output (logs rule failures)
    #[arg(short, long)]
    verbose: bool,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Hide suggestions
    #[arg(long)]
    no_suggestions: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extra rule files (repeatable)
    #[arg(short, long = "rules")]
    rules: Vec<PathBuf>,

    /// Files validated concurrently (0 = one per CPU)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Reuse results for unchanged files
    #[arg(long)]
    cache: bool,

    /// Group text output by severity or by file
    #[arg(long, value_enum)]
    group_by: Option<Grouping>,

    /// Show statistics
    #[arg(long)]
    stats: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// List configured rules and exit
    #[arg(long)]
    list_rules: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum Grouping {
    Severity,
    File,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether the project passed (no error violations)
fn run(cli: Cli) -> anyhow::Result<bool> {
    let project = cli.project.clone();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load_default(&project).context("failed to load configuration")?,
    };

    config.merge_cli(CliOverrides {
        patterns: cli.patterns,
        format: cli.format.map(|f| match f {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
        }),
        group_by: cli.group_by.map(|g| match g {
            Grouping::Severity => GroupBy::Severity,
            Grouping::File => GroupBy::File,
        }),
        verbose: cli.verbose,
        no_suggestions: cli.no_suggestions,
        stats: cli.stats,
        no_color: cli.no_color,
        cache: cli.cache,
        jobs: cli.jobs,
        rule_files: cli.rules,
    });

    let mut engine = Engine::new(config.engine_options(&project));

    let cache_path = config
        .engine
        .cache
        .then(|| default_cache_path(config.engine.cache_dir.as_deref()));
    if let Some(path) = cache_path.as_deref().filter(|p| p.exists()) {
        match ResultCache::load(path) {
            Ok(cache) => engine = engine.with_cache(cache),
            Err(e) => log::warn!("ignoring unreadable cache {}: {}", path.display(), e),
        }
    }

    for path in config.rule_files() {
        let rules = load_rules(&path, &config.rules.severity)
            .with_context(|| format!("failed to load rules from {}", path.display()))?;
        engine.add_rules(rules.into_iter().filter(|r| config.is_rule_enabled(r.id())));
    }

    if cli.list_rules {
        print_rules(engine.rules());
        return Ok(true);
    }

    if engine.rules().is_empty() {
        log::warn!("no rules configured; add rule files under `rules.files` or pass --rules");
    }

    let results = engine
        .validate_files(&config.files.include)
        .context("file discovery failed")?;

    let options = config.report_options();
    colored::control::set_override(options.colored);
    engine
        .print_results(&results, &options)
        .context("failed to render report")?;

    if let Some(path) = &cache_path {
        if let Err(e) = engine.take_cache().save(path) {
            log::warn!("failed to save cache {}: {}", path.display(), e);
        }
    }

    Ok(Summary::from_results(&results).passed())
}

fn print_rules(rules: &[Rule]) {
    println!("{}", "Configured rules:".bold());
    println!();
    for rule in rules {
        let severity = match rule.severity() {
            conformity::Severity::Error => "error".red(),
            conformity::Severity::Warning => "warning".yellow(),
            conformity::Severity::Info => "info".blue(),
        };
        println!(
            "  {} [{}] ({}) {}",
            rule.id().cyan(),
            severity,
            rule.category(),
            rule.name()
        );
        println!("      {}", rule.description());
    }
    println!();
    println!("{} rule(s)", rules.len());
}
