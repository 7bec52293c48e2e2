//! VerticalPodAutoscaler coverage.
//!
//! Every pod controller must be targeted by a VPA in its namespace. Unless
//! the VPA's update mode is `Off`, its container policies must name exactly
//! the controller's containers and give sane `minAllowed`/`maxAllowed`
//! bounds for cpu and memory.

use crate::analyzer::manifests::checks::{CheckContext, CrossResourceCheck, VPA_RULE, object_reporter};
use crate::analyzer::manifests::errors::Reporter;
use crate::analyzer::manifests::exclusions::RuleExclusions;
use crate::analyzer::manifests::parser::quantity::{
    parse_cpu_to_millicores, parse_memory_to_bytes, quantity_string,
};
use crate::analyzer::manifests::storage::kinds::convert_document;
use crate::analyzer::manifests::storage::{ResourceIdentity, ResourceStore, StoredObject};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const VPA_KIND: &str = "VerticalPodAutoscaler";

/// Container name that applies a policy to every container.
const WILDCARD_CONTAINER: &str = "*";

/// `spec.updatePolicy.updateMode` of a VPA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    Off,
    Initial,
    Recreate,
    #[default]
    Auto,
    InPlaceOrRecreate,
}

impl UpdateMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Off" => Some(Self::Off),
            "Initial" => Some(Self::Initial),
            "Recreate" => Some(Self::Recreate),
            "Auto" => Some(Self::Auto),
            "InPlaceOrRecreate" => Some(Self::InPlaceOrRecreate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Initial => "Initial",
            Self::Recreate => "Recreate",
            Self::Auto => "Auto",
            Self::InPlaceOrRecreate => "InPlaceOrRecreate",
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerticalPodAutoscaler {
    spec: Option<VpaSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VpaSpec {
    target_ref: Option<TargetRefSpec>,
    update_policy: Option<UpdatePolicySpec>,
    resource_policy: Option<ResourcePolicySpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetRefSpec {
    kind: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePolicySpec {
    update_mode: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourcePolicySpec {
    container_policies: Option<Vec<ContainerPolicySpec>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerPolicySpec {
    container_name: Option<String>,
    mode: Option<String>,
    min_allowed: Option<BTreeMap<String, serde_yaml::Value>>,
    max_allowed: Option<BTreeMap<String, serde_yaml::Value>>,
}

/// The object a VPA points at. Resolved in the VPA's own namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRef {
    pub kind: String,
    pub name: String,
}

impl TargetRef {
    pub fn identity(&self, namespace: &str) -> ResourceIdentity {
        ResourceIdentity::new(self.kind.as_str(), namespace, self.name.as_str())
    }
}

/// What an indexed VPA promises for its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpaPolicy {
    /// `Kind/name` of the VPA object.
    pub source: String,
    pub update_mode: UpdateMode,
    /// Container names with an explicit policy.
    pub containers: BTreeSet<String>,
    /// Whether a `containerName: "*"` policy is present.
    pub wildcard: bool,
}

/// Index from target identity to the VPA that covers it.
pub type VpaIndex = BTreeMap<ResourceIdentity, VpaPolicy>;

struct ResourceBound {
    resource: &'static str,
    unit: &'static str,
    parse: fn(&str) -> Option<u64>,
}

const BOUNDED_RESOURCES: [ResourceBound; 2] = [
    ResourceBound {
        resource: "cpu",
        unit: "millicores",
        parse: parse_cpu_to_millicores,
    },
    ResourceBound {
        resource: "memory",
        unit: "bytes",
        parse: parse_memory_to_bytes,
    },
];

fn read_bound(
    values: Option<&BTreeMap<String, serde_yaml::Value>>,
    field: &str,
    bound: &ResourceBound,
    container: &str,
    reporter: &Reporter<'_>,
) -> Option<u64> {
    let Some(raw) = values.and_then(|v| v.get(bound.resource)) else {
        reporter.error(format!(
            "container policy {:?}: {}.{} is not set",
            container, field, bound.resource
        ));
        return None;
    };
    let Some(text) = quantity_string(raw) else {
        reporter.error(format!(
            "container policy {:?}: {}.{} is not a quantity",
            container, field, bound.resource
        ));
        return None;
    };
    match (bound.parse)(&text) {
        None => {
            reporter.error_with_value(
                format!(
                    "container policy {:?}: {}.{} is not a valid quantity",
                    container, field, bound.resource
                ),
                text,
            );
            None
        }
        Some(0) => {
            reporter.error_with_value(
                format!(
                    "container policy {:?}: {}.{} must not be zero",
                    container, field, bound.resource
                ),
                text,
            );
            None
        }
        Some(value) => Some(value),
    }
}

/// Report missing, zero, unparseable and inverted cpu/memory bounds.
fn validate_bounds(policy: &ContainerPolicySpec, container: &str, reporter: &Reporter<'_>) {
    for bound in &BOUNDED_RESOURCES {
        let min = read_bound(policy.min_allowed.as_ref(), "minAllowed", bound, container, reporter);
        let max = read_bound(policy.max_allowed.as_ref(), "maxAllowed", bound, container, reporter);
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                reporter.error_with_value(
                    format!(
                        "container policy {:?}: minAllowed.{} is greater than maxAllowed.{}",
                        container, bound.resource, bound.resource
                    ),
                    serde_json::json!({ "min": min, "max": max, "unit": bound.unit }),
                );
            }
        }
    }
}

/// Parse one VPA. Returns the target and policy to index, or `None` when
/// the VPA is malformed enough that it cannot cover anything.
fn parse_vpa(object: &StoredObject, reporter: &Reporter<'_>) -> Option<(TargetRef, VpaPolicy)> {
    let vpa: VerticalPodAutoscaler =
        match convert_document(object.content(), VPA_KIND, "autoscaling.k8s.io/v1 VerticalPodAutoscaler") {
            Ok(vpa) => vpa,
            Err(err) => {
                reporter.error(err.to_string());
                return None;
            }
        };
    let spec = vpa.spec.unwrap_or_default();

    let target = spec.target_ref.unwrap_or_default();
    let (Some(kind), Some(name)) = (
        target.kind.filter(|k| !k.is_empty()),
        target.name.filter(|n| !n.is_empty()),
    ) else {
        reporter.error("VPA has no spec.targetRef.kind or spec.targetRef.name");
        return None;
    };

    let update_mode = match spec.update_policy.and_then(|p| p.update_mode) {
        None => UpdateMode::default(),
        Some(raw) => match UpdateMode::parse(&raw) {
            Some(mode) => mode,
            None => {
                reporter.error_with_value("VPA has an unknown spec.updatePolicy.updateMode", raw);
                return None;
            }
        },
    };

    let mut policy = VpaPolicy {
        source: object.object_id(),
        update_mode,
        containers: BTreeSet::new(),
        wildcard: false,
    };

    if update_mode != UpdateMode::Off {
        let container_policies = spec
            .resource_policy
            .and_then(|p| p.container_policies)
            .unwrap_or_default();
        for container_policy in &container_policies {
            let Some(container) = container_policy
                .container_name
                .as_deref()
                .filter(|c| !c.is_empty())
            else {
                reporter.error("VPA container policy has no containerName");
                continue;
            };

            match container_policy.mode.as_deref() {
                Some("Off") => {}
                None | Some("Auto") => validate_bounds(container_policy, container, reporter),
                Some(other) => {
                    reporter.error_with_value(
                        format!("container policy {:?} has an unknown mode", container),
                        other,
                    );
                }
            }

            if container == WILDCARD_CONTAINER {
                policy.wildcard = true;
            } else {
                policy.containers.insert(container.to_string());
            }
        }
    }

    Some((TargetRef { kind, name }, policy))
}

/// Phase 1: index every VPA in the store by the identity of its target.
pub fn index_vpas(store: &ResourceStore, reporter: &Reporter<'_>) -> VpaIndex {
    let mut index = VpaIndex::new();

    for object in store.objects_of_kind(VPA_KIND) {
        let reporter = object_reporter(reporter, object);
        let Some((target, policy)) = parse_vpa(object, &reporter) else {
            continue;
        };

        let identity = target.identity(object.namespace());
        if let Some(existing) = index.get(&identity) {
            reporter.error(format!(
                "VPA targets {}/{}, which is already targeted by {}",
                target.kind, target.name, existing.source
            ));
            continue;
        }
        index.insert(identity, policy);
    }

    index
}

/// Phase 2: every pod controller must be covered by an indexed VPA.
pub fn check_controllers(
    store: &ResourceStore,
    index: &VpaIndex,
    exclusions: &RuleExclusions,
    reporter: &Reporter<'_>,
) {
    for (kind, object) in store.pod_controllers() {
        if !exclusions.object_enabled(kind.as_str(), object.name()) {
            continue;
        }
        let reporter = object_reporter(reporter, object);

        let Some(policy) = index.get(&object.identity()) else {
            reporter.error("no VPA is found for object");
            continue;
        };
        if policy.update_mode == UpdateMode::Off {
            continue;
        }

        let containers = match object.get_containers() {
            Ok(containers) => containers,
            Err(err) => {
                reporter.error(err.to_string());
                continue;
            }
        };
        let actual: BTreeSet<String> = containers.into_iter().map(|c| c.name).collect();
        let enabled = |container: &str| exclusions.container_enabled(kind.as_str(), object.name(), container);

        if !policy.wildcard {
            for container in actual.difference(&policy.containers) {
                if enabled(container) {
                    reporter.error_with_value(
                        format!("container {:?} is not covered by {}", container, policy.source),
                        container.as_str(),
                    );
                }
            }
        }
        for container in policy.containers.difference(&actual) {
            if enabled(container) {
                reporter.error_with_value(
                    format!(
                        "{} has a container policy for {:?}, which the object does not run",
                        policy.source, container
                    ),
                    container.as_str(),
                );
            }
        }
    }
}

/// Checks that pod controllers are covered by a VerticalPodAutoscaler.
pub struct VpaCheck;

impl CrossResourceCheck for VpaCheck {
    fn rules(&self) -> &'static [&'static str] {
        &[VPA_RULE]
    }

    fn description(&self) -> &'static str {
        "Pod controllers must be targeted by a VPA whose container policies match their containers"
    }

    fn run(&self, ctx: &CheckContext<'_>, reporter: &Reporter<'_>) {
        let reporter = ctx.rule_reporter(reporter, VPA_RULE);
        let index = index_vpas(ctx.store, &reporter);
        check_controllers(ctx.store, &index, &ctx.exclusions(VPA_RULE), &reporter);
    }
}
