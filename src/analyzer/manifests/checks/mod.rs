//! Cross-resource checks.
//!
//! Each check runs over a fully populated [`ResourceStore`] in two phases:
//! index the policy objects it cares about, then walk the pod controllers (or
//! bindings) and probe that index. A malformed object produces a finding for
//! that object and never stops the pass.

pub mod pdb;
pub mod rbac;
pub mod vpa;

use crate::analyzer::manifests::config::ManifestsConfig;
use crate::analyzer::manifests::errors::Reporter;
use crate::analyzer::manifests::exclusions::RuleExclusions;
use crate::analyzer::manifests::storage::{ResourceStore, StoredObject};
use std::sync::OnceLock;

/// Rule id for missing or mismatched VerticalPodAutoscalers.
pub const VPA_RULE: &str = "vpa";
/// Rule id for Deployments and StatefulSets without a PodDisruptionBudget.
pub const PDB_RULE: &str = "pdb";
/// Rule id for DaemonSets covered by a PodDisruptionBudget.
pub const DAEMONSET_PDB_RULE: &str = "daemonset-pdb";
/// Rule id for bindings to ServiceAccounts the module does not define.
pub const BINDING_SUBJECT_RULE: &str = "binding-subject";
/// Rule id for ingestion problems (syntax errors, duplicates).
pub const MANIFEST_RULE: &str = "manifest";

/// Everything a check needs to evaluate one module.
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    pub store: &'a ResourceStore,
    /// Module name, used as the finding module id.
    pub module_name: &'a str,
    /// Namespace the module deploys into.
    pub namespace: &'a str,
    pub config: &'a ManifestsConfig,
}

impl<'a> CheckContext<'a> {
    /// Reporter for `rule`, capped at the rule's configured level.
    pub fn rule_reporter<'r>(&self, reporter: &Reporter<'r>, rule: &str) -> Reporter<'r> {
        let reporter = reporter.with_rule(rule);
        match self.config.rule_level(rule) {
            Some(level) => reporter.with_max_level(level),
            None => reporter,
        }
    }

    pub fn exclusions(&self, rule: &str) -> RuleExclusions {
        self.config.exclusions_for(rule)
    }
}

/// Reporter with the object id and location of `object` attached.
pub fn object_reporter<'r>(reporter: &Reporter<'r>, object: &StoredObject) -> Reporter<'r> {
    let reporter = reporter
        .with_object(object.object_id())
        .with_file_path(object.short_path());
    match object.line() {
        Some(line) => reporter.with_line(line),
        None => reporter,
    }
}

/// A check that correlates objects across the store.
pub trait CrossResourceCheck: Send + Sync {
    /// Rule ids this check reports under.
    fn rules(&self) -> &'static [&'static str];

    /// Get the check description.
    fn description(&self) -> &'static str;

    /// Run the check and report through `reporter`.
    fn run(&self, ctx: &CheckContext<'_>, reporter: &Reporter<'_>);
}

static CHECKS: OnceLock<Vec<Box<dyn CrossResourceCheck>>> = OnceLock::new();

/// All built-in cross-resource checks, in evaluation order.
pub fn builtin_checks() -> &'static [Box<dyn CrossResourceCheck>] {
    CHECKS.get_or_init(|| {
        vec![
            Box::new(vpa::VpaCheck),
            Box::new(pdb::PdbCheck),
            Box::new(rbac::BindingSubjectCheck),
        ]
    })
}

/// Run every built-in check over the store.
pub fn run_all(ctx: &CheckContext<'_>, reporter: &Reporter<'_>) {
    for check in builtin_checks() {
        log::debug!(
            "running {} on module {}",
            check.rules().join(","),
            ctx.module_name
        );
        check.run(ctx, reporter);
    }
}
