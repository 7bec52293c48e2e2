//! # modcheck
//!
//! Cross-resource policy checks for the rendered Kubernetes manifests of a
//! modular platform.
//!
//! ## Features
//!
//! - **Resource Store**: every rendered object indexed by kind, namespace and name
//! - **Typed Accessors**: containers, security context and host network of pod controllers
//! - **Cross-Resource Checks**: VPA coverage, PodDisruptionBudget coverage, RBAC subjects
//! - **Exclusions**: per-rule object and container suppression from configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use modcheck::{ManifestsConfig, lint_module};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let result = lint_module(Path::new("./modules/example"), &ManifestsConfig::default())?;
//! println!("{} finding(s)", result.findings.len());
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod cli;

// Re-export commonly used types and functions
pub use analyzer::manifests::{
    Finding, LintResult, ManifestsConfig, ResourceStore, Severity, lint_module, lint_modules,
};

/// The current version of the CLI tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
