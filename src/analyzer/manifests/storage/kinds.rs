//! Kind dispatch for typed projections.
//!
//! Stored objects keep the generic YAML document. Typed views are produced on
//! demand by looking the declared kind up in a converter registry, so adding a
//! pod-template-bearing kind means adding one registry entry.

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Container, PodSecurityContext, PodSpec, PodTemplateSpec};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::OnceLock;

/// A generic document could not be converted into the schema of its kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot convert {kind} object to {target}: {message}")]
pub struct ConversionError {
    /// Declared kind of the document.
    pub kind: String,
    /// Name of the target shape.
    pub target: &'static str,
    pub message: String,
}

/// Outcome of asking for a typed view of a document.
#[derive(Debug)]
pub enum Projection<T> {
    /// The kind is supported and the document converted.
    Converted(T),
    /// The kind has no such view (e.g. containers of a ConfigMap).
    NotApplicable,
    /// The kind is supported but the document does not fit the schema.
    Failed(ConversionError),
}

impl<T> Projection<T> {
    /// Collapse into a `Result`, mapping `NotApplicable` to `Ok(None)`.
    pub fn into_result(self) -> Result<Option<T>, ConversionError> {
        match self {
            Self::Converted(value) => Ok(Some(value)),
            Self::NotApplicable => Ok(None),
            Self::Failed(err) => Err(err),
        }
    }

    pub fn is_applicable(&self) -> bool {
        !matches!(self, Self::NotApplicable)
    }
}

/// Kinds that run containers through a pod template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ControllerKind {
    Deployment,
    DaemonSet,
    StatefulSet,
}

impl ControllerKind {
    pub const ALL: [ControllerKind; 3] = [Self::Deployment, Self::DaemonSet, Self::StatefulSet];

    /// Get the Kubernetes kind name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployment => "Deployment",
            Self::DaemonSet => "DaemonSet",
            Self::StatefulSet => "StatefulSet",
        }
    }

    /// Parse from a Kubernetes kind string.
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "Deployment" => Some(Self::Deployment),
            "DaemonSet" => Some(Self::DaemonSet),
            "StatefulSet" => Some(Self::StatefulSet),
            _ => None,
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed view of a pod controller.
#[derive(Debug, Clone)]
pub enum PodController {
    Deployment(Box<Deployment>),
    DaemonSet(Box<DaemonSet>),
    StatefulSet(Box<StatefulSet>),
}

impl PodController {
    pub fn kind(&self) -> ControllerKind {
        match self {
            Self::Deployment(_) => ControllerKind::Deployment,
            Self::DaemonSet(_) => ControllerKind::DaemonSet,
            Self::StatefulSet(_) => ControllerKind::StatefulSet,
        }
    }

    /// The pod template, if the controller has a spec at all.
    pub fn pod_template(&self) -> Option<&PodTemplateSpec> {
        match self {
            Self::Deployment(d) => d.spec.as_ref().map(|s| &s.template),
            Self::DaemonSet(d) => d.spec.as_ref().map(|s| &s.template),
            Self::StatefulSet(s) => s.spec.as_ref().map(|s| &s.template),
        }
    }

    pub fn pod_spec(&self) -> Option<&PodSpec> {
        self.pod_template()?.spec.as_ref()
    }

    pub fn containers(&self) -> &[Container] {
        self.pod_spec()
            .map(|spec| spec.containers.as_slice())
            .unwrap_or_default()
    }

    pub fn init_containers(&self) -> &[Container] {
        self.pod_spec()
            .and_then(|spec| spec.init_containers.as_deref())
            .unwrap_or_default()
    }

    /// Main containers followed by init containers, each in source order.
    pub fn all_containers(&self) -> Vec<Container> {
        self.containers()
            .iter()
            .chain(self.init_containers())
            .cloned()
            .collect()
    }

    pub fn pod_security_context(&self) -> Option<&PodSecurityContext> {
        self.pod_spec()?.security_context.as_ref()
    }

    pub fn host_network(&self) -> bool {
        self.pod_spec()
            .and_then(|spec| spec.host_network)
            .unwrap_or(false)
    }

    /// Labels of the pod template; empty when none are set.
    pub fn template_labels(&self) -> BTreeMap<String, String> {
        self.pod_template()
            .and_then(|t| t.metadata.as_ref())
            .and_then(|m| m.labels.clone())
            .unwrap_or_default()
    }
}

/// Convert a generic document into `T`.
pub fn convert_document<T: DeserializeOwned>(
    document: &serde_yaml::Value,
    kind: &str,
    target: &'static str,
) -> Result<T, ConversionError> {
    serde_yaml::from_value(document.clone()).map_err(|e| ConversionError {
        kind: kind.to_string(),
        target,
        message: e.to_string(),
    })
}

type PodControllerConverter = fn(&serde_yaml::Value) -> Result<PodController, ConversionError>;

static POD_CONTROLLERS: OnceLock<HashMap<&'static str, PodControllerConverter>> = OnceLock::new();

/// Registry of pod-controller converters keyed by kind.
pub fn pod_controller_registry() -> &'static HashMap<&'static str, PodControllerConverter> {
    POD_CONTROLLERS.get_or_init(|| {
        let mut map: HashMap<&'static str, PodControllerConverter> = HashMap::new();

        map.insert("Deployment", |doc: &serde_yaml::Value| {
            convert_document(doc, "Deployment", "apps/v1 Deployment")
                .map(|d| PodController::Deployment(Box::new(d)))
        });
        map.insert("DaemonSet", |doc: &serde_yaml::Value| {
            convert_document(doc, "DaemonSet", "apps/v1 DaemonSet")
                .map(|d| PodController::DaemonSet(Box::new(d)))
        });
        map.insert("StatefulSet", |doc: &serde_yaml::Value| {
            convert_document(doc, "StatefulSet", "apps/v1 StatefulSet")
                .map(|s| PodController::StatefulSet(Box::new(s)))
        });

        map
    })
}

/// Project a document of the given kind into a pod controller.
pub fn project_pod_controller(kind: &str, document: &serde_yaml::Value) -> Projection<PodController> {
    match pod_controller_registry().get(kind) {
        None => Projection::NotApplicable,
        Some(convert) => match convert(document) {
            Ok(controller) => Projection::Converted(controller),
            Err(err) => Projection::Failed(err),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> serde_yaml::Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_registry_covers_controller_kinds() {
        for kind in ControllerKind::ALL {
            assert!(pod_controller_registry().contains_key(kind.as_str()));
            assert_eq!(ControllerKind::from_kind(kind.as_str()), Some(kind));
        }
        assert_eq!(ControllerKind::from_kind("Job"), None);
    }

    #[test]
    fn test_unknown_kind_is_not_applicable() {
        let value = doc("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: x\n");
        assert!(matches!(
            project_pod_controller("ConfigMap", &value),
            Projection::NotApplicable
        ));
    }

    #[test]
    fn test_schema_mismatch_is_failed() {
        let value = doc(
            r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: broken
spec:
  template:
    spec:
      containers: "not-a-list"
"#,
        );
        match project_pod_controller("Deployment", &value) {
            Projection::Failed(err) => {
                assert_eq!(err.kind, "Deployment");
                assert!(err.to_string().contains("Deployment"));
            }
            other => panic!("expected conversion failure, got {:?}", other.is_applicable()),
        }
    }

    #[test]
    fn test_statefulset_view() {
        let value = doc(
            r#"
apiVersion: apps/v1
kind: StatefulSet
metadata:
  name: db
spec:
  serviceName: db
  selector:
    matchLabels:
      app: db
  template:
    metadata:
      labels:
        app: db
    spec:
      hostNetwork: true
      securityContext:
        runAsNonRoot: true
      initContainers:
      - name: init
      containers:
      - name: postgres
"#,
        );
        let controller = project_pod_controller("StatefulSet", &value)
            .into_result()
            .unwrap()
            .unwrap();
        assert_eq!(controller.kind(), ControllerKind::StatefulSet);
        assert!(controller.host_network());
        assert_eq!(
            controller.pod_security_context().and_then(|c| c.run_as_non_root),
            Some(true)
        );
        let names: Vec<_> = controller
            .all_containers()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["postgres", "init"]);
        assert_eq!(controller.template_labels().get("app").map(String::as_str), Some("db"));
    }
}
