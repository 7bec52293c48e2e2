use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::analyzer::manifests::{self, Severity};

#[derive(Parser)]
#[command(name = "modcheck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cross-resource policy checks for rendered Kubernetes manifests")]
#[command(long_about = "Indexes the rendered manifests of platform modules and checks that every pod controller has its companion objects: a matching VerticalPodAutoscaler, a PodDisruptionBudget (none for DaemonSets) and defined ServiceAccounts for its role bindings.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (defaults to .modcheck.yaml in the current directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check one or more rendered module directories
    Lint {
        /// Module directories containing rendered manifests
        #[arg(value_name = "MODULE_DIR", required = true)]
        modules: Vec<PathBuf>,

        /// Module namespace (overrides the .namespace file and config)
        #[arg(short, long)]
        namespace: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        format: OutputFormat,

        /// Minimum severity that fails the run
        #[arg(long, value_enum)]
        failure_threshold: Option<SeverityThreshold>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// List the built-in rules
    Rules,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
    Github,
}

impl From<OutputFormat> for manifests::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Plain => manifests::OutputFormat::Plain,
            OutputFormat::Json => manifests::OutputFormat::Json,
            OutputFormat::Github => manifests::OutputFormat::GitHub,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SeverityThreshold {
    Error,
    Warning,
    Info,
}

impl From<SeverityThreshold> for Severity {
    fn from(threshold: SeverityThreshold) -> Self {
        match threshold {
            SeverityThreshold::Error => Severity::Error,
            SeverityThreshold::Warning => Severity::Warning,
            SeverityThreshold::Info => Severity::Info,
        }
    }
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_lint() {
        let cli = Cli::parse_from([
            "modcheck",
            "lint",
            "modules/a",
            "modules/b",
            "--namespace",
            "d8-example",
            "--format",
            "json",
            "-vv",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Lint {
                modules,
                namespace,
                format,
                failure_threshold,
                no_color,
            } => {
                assert_eq!(modules.len(), 2);
                assert_eq!(namespace.as_deref(), Some("d8-example"));
                assert_eq!(format, OutputFormat::Json);
                assert_eq!(failure_threshold, None);
                assert!(!no_color);
            }
            Commands::Rules => panic!("expected lint"),
        }
    }

    #[test]
    fn test_lint_requires_module() {
        assert!(Cli::try_parse_from(["modcheck", "lint"]).is_err());
    }
}
