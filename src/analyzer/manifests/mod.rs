//! Cross-resource policy checks for rendered Kubernetes manifests.
//!
//! A module is a directory of already rendered YAML files. Every document is
//! indexed in a [`ResourceStore`] by `(kind, namespace, name)`, after which
//! the cross-resource checks correlate pod controllers with the policy
//! objects they need:
//!
//! - `vpa`: every Deployment, DaemonSet and StatefulSet is targeted by a
//!   VerticalPodAutoscaler whose container policies match its containers
//! - `pdb`: Deployments and StatefulSets are selected by a
//!   PodDisruptionBudget in their namespace
//! - `daemonset-pdb`: DaemonSets are not selected by any PodDisruptionBudget
//! - `binding-subject`: ServiceAccounts bound in the module namespace are
//!   defined by the module
//! - `manifest`: unparseable documents and duplicate objects
//!
//! Findings carry rule, module, object, file and line context and can be
//! suppressed per object or container through [`ManifestsConfig`].
//!
//! # Example
//!
//! ```rust,no_run
//! use modcheck::analyzer::manifests::{ManifestsConfig, lint_module};
//! use std::path::Path;
//!
//! let config = ManifestsConfig::default();
//! let result = lint_module(Path::new("./modules/example"), &config).unwrap();
//!
//! for finding in result.reportable() {
//!     println!("{}: {}", finding.object_id.as_deref().unwrap_or("-"), finding.message);
//! }
//! ```

pub mod cache;
pub mod checks;
pub mod config;
pub mod errors;
pub mod exclusions;
pub mod formatter;
pub mod lint;
pub mod parser;
pub mod selector;
pub mod storage;
pub mod types;

pub use cache::ResultCache;
pub use config::{ConfigError, ManifestsConfig, RuleSettings};
pub use errors::{FindingContext, FindingSink, Reporter};
pub use exclusions::{ContainerRuleExclusion, ExclusionMode, KindRuleExclusion};
pub use formatter::{OutputFormat, format_results, format_results_to_string};
pub use lint::{
    LintError, LintResult, LintSummary, ModuleContext, lint_content, lint_documents, lint_module,
    lint_module_cached, lint_modules,
};
pub use storage::{ResourceIdentity, ResourceStore, StoreError, StoredObject};
pub use types::{Finding, RuleId, Severity};
