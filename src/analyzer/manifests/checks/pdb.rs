//! PodDisruptionBudget coverage.
//!
//! Deployments and StatefulSets must have their pods selected by at least one
//! PodDisruptionBudget in their namespace. DaemonSets must not: draining a
//! node evicts its DaemonSet pod regardless, so a budget only blocks the
//! drain. Both passes share one selector index.

use crate::analyzer::manifests::checks::{
    CheckContext, CrossResourceCheck, DAEMONSET_PDB_RULE, PDB_RULE, object_reporter,
};
use crate::analyzer::manifests::errors::Reporter;
use crate::analyzer::manifests::exclusions::RuleExclusions;
use crate::analyzer::manifests::selector::{NamespacedSelector, Selector};
use crate::analyzer::manifests::storage::kinds::convert_document;
use crate::analyzer::manifests::storage::{ControllerKind, ResourceStore, StoredObject};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;

pub const PDB_KIND: &str = "PodDisruptionBudget";

/// Annotations that tie an object to the Helm hook lifecycle.
pub const HOOK_ANNOTATIONS: &[&str] = &["helm.sh/hook", "helm.sh/hook-delete-policy"];

/// An indexed budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdbEntry {
    /// `Kind/name` of the budget.
    pub source: String,
    pub selector: NamespacedSelector,
}

/// Compile the selector of one budget, reporting why it cannot be indexed.
fn parse_pdb(object: &StoredObject, reporter: &Reporter<'_>) -> Option<PdbEntry> {
    let annotations = object.annotations();
    if let Some(hook) = HOOK_ANNOTATIONS.iter().find(|a| annotations.contains_key(**a)) {
        reporter.error_with_value(
            format!("PodDisruptionBudget must not carry the {} annotation", hook),
            annotations.get(*hook).cloned().unwrap_or_default(),
        );
        return None;
    }

    let pdb: PodDisruptionBudget = match convert_document(object.content(), PDB_KIND, "policy/v1 PodDisruptionBudget") {
        Ok(pdb) => pdb,
        Err(err) => {
            reporter.error(err.to_string());
            return None;
        }
    };

    let Some(label_selector) = pdb.spec.and_then(|s| s.selector) else {
        reporter.error("PodDisruptionBudget has no spec.selector");
        return None;
    };

    match Selector::from_label_selector(&label_selector) {
        Ok(selector) => Some(PdbEntry {
            source: object.object_id(),
            selector: NamespacedSelector::new(object.namespace(), selector),
        }),
        Err(err) => {
            reporter.error(format!("PodDisruptionBudget has an invalid selector: {}", err));
            None
        }
    }
}

/// Phase 1: compile the selectors of every budget in the store.
pub fn index_pdbs(store: &ResourceStore, reporter: &Reporter<'_>) -> Vec<PdbEntry> {
    store
        .objects_of_kind(PDB_KIND)
        .filter_map(|object| parse_pdb(object, &object_reporter(reporter, object)))
        .collect()
}

/// Budgets whose selector matches the pod template of `object`.
fn matching<'i>(
    object: &StoredObject,
    index: &'i [PdbEntry],
    reporter: &Reporter<'_>,
) -> Option<Vec<&'i PdbEntry>> {
    let labels = match object.pod_template_labels() {
        Ok(labels) => labels,
        Err(err) => {
            reporter.error(err.to_string());
            return None;
        }
    };
    Some(
        index
            .iter()
            .filter(|entry| entry.selector.matches(object.namespace(), &labels))
            .collect(),
    )
}

/// Phase 2a: Deployments and StatefulSets need at least one matching budget.
pub fn check_required(
    store: &ResourceStore,
    index: &[PdbEntry],
    exclusions: &RuleExclusions,
    reporter: &Reporter<'_>,
) {
    for (kind, object) in store.pod_controllers() {
        if kind == ControllerKind::DaemonSet || !exclusions.object_enabled(kind.as_str(), object.name()) {
            continue;
        }
        let reporter = object_reporter(reporter, object);
        let Some(matches) = matching(object, index, &reporter) else {
            continue;
        };
        if matches.is_empty() {
            reporter.error("no PodDisruptionBudget matches the pod template labels");
        }
    }
}

/// Phase 2b: DaemonSets must not be matched by any budget.
pub fn check_forbidden(
    store: &ResourceStore,
    index: &[PdbEntry],
    exclusions: &RuleExclusions,
    reporter: &Reporter<'_>,
) {
    for object in store.objects_of_kind(ControllerKind::DaemonSet.as_str()) {
        if !exclusions.object_enabled(ControllerKind::DaemonSet.as_str(), object.name()) {
            continue;
        }
        let reporter = object_reporter(reporter, object);
        let Some(matches) = matching(object, index, &reporter) else {
            continue;
        };
        for entry in matches {
            reporter.error_with_value(
                format!("DaemonSet pods are selected by {}", entry.source),
                entry.source.as_str(),
            );
        }
    }
}

/// Checks PodDisruptionBudget coverage of pod controllers.
pub struct PdbCheck;

impl CrossResourceCheck for PdbCheck {
    fn rules(&self) -> &'static [&'static str] {
        &[PDB_RULE, DAEMONSET_PDB_RULE]
    }

    fn description(&self) -> &'static str {
        "Deployments and StatefulSets need a PodDisruptionBudget, DaemonSets must not have one"
    }

    fn run(&self, ctx: &CheckContext<'_>, reporter: &Reporter<'_>) {
        let required = ctx.rule_reporter(reporter, PDB_RULE);
        let index = index_pdbs(ctx.store, &required);

        check_required(ctx.store, &index, &ctx.exclusions(PDB_RULE), &required);
        check_forbidden(
            ctx.store,
            &index,
            &ctx.exclusions(DAEMONSET_PDB_RULE),
            &ctx.rule_reporter(reporter, DAEMONSET_PDB_RULE),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::manifests::checks::test_support::store_from_yaml;
    use crate::analyzer::manifests::errors::FindingSink;
    use crate::analyzer::manifests::exclusions::{ExclusionMode, KindRuleExclusion, ObjectExclusions};
    use crate::analyzer::manifests::types::Finding;

    fn controller(kind: &str, name: &str, namespace: &str, app: &str) -> String {
        format!(
            "apiVersion: apps/v1\nkind: {}\nmetadata:\n  name: {}\n  namespace: {}\nspec:\n  selector:\n    matchLabels:\n      app: {}\n  template:\n    metadata:\n      labels:\n        app: {}\n    spec:\n      containers:\n      - name: main\n",
            kind, name, namespace, app, app
        )
    }

    fn pdb(name: &str, namespace: &str, app: &str) -> String {
        format!(
            "apiVersion: policy/v1\nkind: PodDisruptionBudget\nmetadata:\n  name: {}\n  namespace: {}\nspec:\n  maxUnavailable: 1\n  selector:\n    matchLabels:\n      app: {}\n",
            name, namespace, app
        )
    }

    fn run_with(docs: &[String], exclusions: &RuleExclusions) -> (Vec<Finding>, Vec<Finding>) {
        let store = store_from_yaml(&docs.join("---\n"));
        let required_sink = FindingSink::new();
        let forbidden_sink = FindingSink::new();

        let index = index_pdbs(&store, &required_sink.reporter());
        check_required(&store, &index, exclusions, &required_sink.reporter());
        check_forbidden(&store, &index, exclusions, &forbidden_sink.reporter());
        (required_sink.into_findings(), forbidden_sink.into_findings())
    }

    fn run(docs: &[String]) -> (Vec<Finding>, Vec<Finding>) {
        run_with(docs, &RuleExclusions::default())
    }

    #[test]
    fn test_polarity() {
        let (required, forbidden) = run(&[controller("Deployment", "web", "ns1", "web"), pdb("web", "ns1", "web")]);
        assert!(required.is_empty());
        assert!(forbidden.is_empty());

        let (required, _) = run(&[controller("Deployment", "web", "ns1", "web")]);
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].object_id.as_deref(), Some("Deployment/web"));

        let (required, forbidden) = run(&[controller("DaemonSet", "agent", "ns1", "agent"), pdb("agent", "ns1", "agent")]);
        assert!(required.is_empty());
        assert_eq!(forbidden.len(), 1);
        assert_eq!(forbidden[0].value, Some(serde_json::json!("PodDisruptionBudget/agent")));
    }

    #[test]
    fn test_unconvertible_controller_does_not_stop_the_pass() {
        let broken = |kind: &str, name: &str| {
            controller(kind, name, "ns1", name)
                .replace("    spec:\n      containers:", "    spec:\n      containers: not-a-list")
                .replace("      - name: main\n", "")
        };
        let docs = vec![
            broken("Deployment", "broken"),
            pdb("broken", "ns1", "broken"),
            controller("Deployment", "web", "ns1", "web"),
            broken("DaemonSet", "agent"),
            pdb("agent", "ns1", "agent"),
            controller("DaemonSet", "node", "ns1", "node"),
            pdb("node", "ns1", "node"),
        ];
        let (required, forbidden) = run(&docs);

        assert_eq!(required.len(), 2);
        assert_eq!(required[0].object_id.as_deref(), Some("Deployment/broken"));
        assert!(required[0].message.contains("cannot convert"));
        assert_eq!(required[1].object_id.as_deref(), Some("Deployment/web"));
        assert!(required[1].message.contains("no PodDisruptionBudget"));

        assert_eq!(forbidden.len(), 2);
        assert_eq!(forbidden[0].object_id.as_deref(), Some("DaemonSet/agent"));
        assert!(forbidden[0].message.contains("cannot convert"));
        assert_eq!(forbidden[1].object_id.as_deref(), Some("DaemonSet/node"));
        assert_eq!(forbidden[1].value, Some(serde_json::json!("PodDisruptionBudget/node")));
    }

    #[test]
    fn test_daemonset_without_budget_is_fine() {
        let (required, forbidden) = run(&[controller("DaemonSet", "agent", "ns1", "agent")]);
        assert!(required.is_empty());
        assert!(forbidden.is_empty());
    }

    #[test]
    fn test_statefulset_requires_budget() {
        let (required, _) = run(&[controller("StatefulSet", "db", "ns1", "db"), pdb("other", "ns1", "web")]);
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].object_id.as_deref(), Some("StatefulSet/db"));
    }

    #[test]
    fn test_selector_scoped_to_namespace() {
        let (required, _) = run(&[controller("Deployment", "web", "ns1", "web"), pdb("web", "ns2", "web")]);
        assert_eq!(required.len(), 1);

        let (_, forbidden) = run(&[controller("DaemonSet", "agent", "ns1", "agent"), pdb("agent", "ns2", "agent")]);
        assert!(forbidden.is_empty());
    }

    #[test]
    fn test_each_matching_budget_is_reported_for_daemonset() {
        let (_, forbidden) = run(&[
            controller("DaemonSet", "agent", "ns1", "agent"),
            pdb("a", "ns1", "agent"),
            pdb("b", "ns1", "agent"),
        ]);
        assert_eq!(forbidden.len(), 2);
    }

    #[test]
    fn test_hook_annotation_rejects_budget() {
        let hooked = pdb("web", "ns1", "web").replace(
            "  namespace: ns1\n",
            "  namespace: ns1\n  annotations:\n    helm.sh/hook: post-install\n",
        );
        let (required, _) = run(&[controller("Deployment", "web", "ns1", "web"), hooked]);
        let messages: Vec<_> = required.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "PodDisruptionBudget must not carry the helm.sh/hook annotation",
                "no PodDisruptionBudget matches the pod template labels"
            ]
        );
        assert_eq!(required[0].value, Some(serde_json::json!("post-install")));
    }

    #[test]
    fn test_missing_and_empty_selector() {
        let missing = "apiVersion: policy/v1\nkind: PodDisruptionBudget\nmetadata:\n  name: web\n  namespace: ns1\nspec:\n  minAvailable: 1\n".to_string();
        let (required, _) = run(&[missing]);
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].message, "PodDisruptionBudget has no spec.selector");

        let empty = "apiVersion: policy/v1\nkind: PodDisruptionBudget\nmetadata:\n  name: all\n  namespace: ns1\nspec:\n  minAvailable: 1\n  selector: {}\n".to_string();
        let (required, _) = run(&[controller("Deployment", "web", "ns1", "web"), empty]);
        assert!(required.is_empty());
    }

    #[test]
    fn test_match_expressions_selector() {
        let doc = r#"apiVersion: policy/v1
kind: PodDisruptionBudget
metadata:
  name: web
  namespace: ns1
spec:
  maxUnavailable: 1
  selector:
    matchExpressions:
    - key: app
      operator: In
      values: [web, api]
"#
        .to_string();
        let (required, _) = run(&[controller("Deployment", "web", "ns1", "web"), doc.clone()]);
        assert!(required.is_empty());

        let bad = doc.replace("operator: In", "operator: Near");
        let (required, _) = run(&[controller("Deployment", "web", "ns1", "web"), bad]);
        assert_eq!(required.len(), 2);
        assert!(required[0].message.contains("invalid selector"));
    }

    #[test]
    fn test_exclusion() {
        let exclusions = RuleExclusions {
            objects: ObjectExclusions::new(
                vec![KindRuleExclusion::new("Deployment", "web")],
                ExclusionMode::AnyEntry,
            ),
            ..Default::default()
        };
        let (required, _) = run_with(&[controller("Deployment", "web", "ns1", "web")], &exclusions);
        assert!(required.is_empty());
    }
}
