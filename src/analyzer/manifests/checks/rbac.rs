//! RoleBinding / ClusterRoleBinding subject checks.

use crate::analyzer::manifests::checks::{
    BINDING_SUBJECT_RULE, CheckContext, CrossResourceCheck, object_reporter,
};
use crate::analyzer::manifests::errors::Reporter;
use crate::analyzer::manifests::exclusions::RuleExclusions;
use crate::analyzer::manifests::storage::kinds::convert_document;
use crate::analyzer::manifests::storage::{ResourceIdentity, ResourceStore, StoredObject};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding, Subject};

pub const ROLE_BINDING_KIND: &str = "RoleBinding";
pub const CLUSTER_ROLE_BINDING_KIND: &str = "ClusterRoleBinding";
pub const SERVICE_ACCOUNT_KIND: &str = "ServiceAccount";

/// Shared ServiceAccounts that other modules bind to on purpose, as
/// `(namespace, name)`.
pub const EXEMPT_SERVICE_ACCOUNTS: &[(&str, &str)] = &[
    ("d8-monitoring", "prometheus"),
    ("d8-monitoring", "grafana-agent"),
    ("d8-log-shipper", "log-shipper"),
    ("d8-system", "deckhouse"),
];

pub fn is_exempt(namespace: &str, name: &str) -> bool {
    EXEMPT_SERVICE_ACCOUNTS
        .iter()
        .any(|(ns, n)| *ns == namespace && *n == name)
}

/// Subjects of a binding and the namespace they default to.
fn binding_subjects(object: &StoredObject) -> Result<(Vec<Subject>, Option<String>), String> {
    match object.kind() {
        ROLE_BINDING_KIND => {
            let binding: RoleBinding =
                convert_document(object.content(), ROLE_BINDING_KIND, "rbac.authorization.k8s.io/v1 RoleBinding")
                    .map_err(|e| e.to_string())?;
            Ok((binding.subjects.unwrap_or_default(), binding.metadata.namespace))
        }
        _ => {
            let binding: ClusterRoleBinding = convert_document(
                object.content(),
                CLUSTER_ROLE_BINDING_KIND,
                "rbac.authorization.k8s.io/v1 ClusterRoleBinding",
            )
            .map_err(|e| e.to_string())?;
            Ok((binding.subjects.unwrap_or_default(), None))
        }
    }
}

/// Report ServiceAccount subjects in `namespace` that the store does not hold.
pub fn check_bindings(
    store: &ResourceStore,
    namespace: &str,
    exclusions: &RuleExclusions,
    reporter: &Reporter<'_>,
) {
    let bindings = store
        .objects_of_kind(ROLE_BINDING_KIND)
        .chain(store.objects_of_kind(CLUSTER_ROLE_BINDING_KIND));

    for object in bindings {
        if !exclusions.object_enabled(object.kind(), object.name()) {
            continue;
        }
        let reporter = object_reporter(reporter, object);

        let (subjects, default_namespace) = match binding_subjects(object) {
            Ok(parsed) => parsed,
            Err(message) => {
                reporter.error(message);
                continue;
            }
        };

        for subject in subjects.iter().filter(|s| s.kind == SERVICE_ACCOUNT_KIND) {
            let subject_namespace = subject
                .namespace
                .as_deref()
                .or(default_namespace.as_deref())
                .unwrap_or_default();
            if subject_namespace != namespace || is_exempt(subject_namespace, &subject.name) {
                continue;
            }

            let identity = ResourceIdentity::new(SERVICE_ACCOUNT_KIND, subject_namespace, subject.name.as_str());
            if !store.exists(&identity) {
                reporter.error_with_value(
                    format!(
                        "ServiceAccount {}/{} is bound but not defined in the module",
                        subject_namespace, subject.name
                    ),
                    subject.name.as_str(),
                );
            }
        }
    }
}

/// Checks that bound ServiceAccounts of the module namespace exist.
pub struct BindingSubjectCheck;

impl CrossResourceCheck for BindingSubjectCheck {
    fn rules(&self) -> &'static [&'static str] {
        &[BINDING_SUBJECT_RULE]
    }

    fn description(&self) -> &'static str {
        "ServiceAccounts bound in the module namespace must be defined by the module"
    }

    fn run(&self, ctx: &CheckContext<'_>, reporter: &Reporter<'_>) {
        if ctx.namespace.is_empty() {
            log::warn!(
                "module {} has no namespace, skipping {}",
                ctx.module_name,
                BINDING_SUBJECT_RULE
            );
            return;
        }
        check_bindings(
            ctx.store,
            ctx.namespace,
            &ctx.exclusions(BINDING_SUBJECT_RULE),
            &ctx.rule_reporter(reporter, BINDING_SUBJECT_RULE),
        );
    }
}
