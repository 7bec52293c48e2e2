use anyhow::{Context, Result};
use clap::Parser;
use modcheck::analyzer::manifests::{
    self, LintResult, ManifestsConfig, ResultCache, checks, format_results,
};
use modcheck::cli::{Cli, Commands, OutputFormat, SeverityThreshold};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;

/// Findings at or above the failure threshold.
const EXIT_FINDINGS: i32 = 1;
/// A module could not be evaluated, or the configuration is broken.
const EXIT_ERROR: i32 = 2;

fn main() {
    match run() {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(EXIT_ERROR);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    // Initialize logging
    cli.init_logging();

    match cli.command {
        Commands::Lint {
            modules,
            namespace,
            format,
            failure_threshold,
            no_color,
        } => {
            let config = load_config(cli.config.as_deref(), namespace, failure_threshold)?;
            handle_lint(&modules, &config, format, no_color)
        }
        Commands::Rules => {
            handle_rules();
            Ok(0)
        }
    }
}

fn load_config(
    path: Option<&Path>,
    namespace: Option<String>,
    failure_threshold: Option<SeverityThreshold>,
) -> Result<ManifestsConfig> {
    let mut config = match path {
        Some(path) => ManifestsConfig::load_from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            ManifestsConfig::load_from_default(&cwd)
                .context("failed to load default configuration")?
                .unwrap_or_default()
        }
    };

    if let Some(namespace) = namespace {
        config.namespace = Some(namespace);
    }
    if let Some(threshold) = failure_threshold {
        config.failure_threshold = threshold.into();
    }
    Ok(config)
}

fn handle_lint(
    modules: &[PathBuf],
    config: &ManifestsConfig,
    format: OutputFormat,
    no_color: bool,
) -> Result<i32> {
    let cache = ResultCache::new();
    let mut results: Vec<LintResult> = Vec::new();
    let mut broken = 0;

    for (path, outcome) in modules.iter().zip(manifests::lint_modules(modules, config, &cache)) {
        match outcome {
            Ok(result) => results.push(result),
            Err(e) => {
                eprintln!("Error: {}: {}", path.display(), e);
                broken += 1;
            }
        }
    }

    let color = !no_color && std::io::stdout().is_terminal();
    format_results(&results, format.into(), color, &mut std::io::stdout().lock())
        .context("failed to write results")?;

    if broken > 0 {
        return Ok(EXIT_ERROR);
    }
    if results.iter().any(|r| r.should_fail(config)) {
        return Ok(EXIT_FINDINGS);
    }
    Ok(0)
}

fn handle_rules() {
    for check in checks::builtin_checks() {
        for rule in check.rules() {
            println!("{:<16} {}", rule, check.description());
        }
    }
    println!(
        "{:<16} {}",
        checks::MANIFEST_RULE,
        "Documents must parse and objects must not be defined twice"
    );
}
