//! Stored manifest objects and their typed accessors.

use crate::analyzer::manifests::parser::RawManifest;
use crate::analyzer::manifests::storage::ResourceIdentity;
use crate::analyzer::manifests::storage::kinds::{
    ConversionError, PodController, Projection, convert_document, project_pod_controller,
};
use k8s_openapi::api::core::v1::{Container, PodSecurityContext, Service};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Hex BLAKE3 digest of a document's raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash raw document bytes.
    pub fn of(raw: &[u8]) -> Self {
        Self(blake3::hash(raw).to_hex().to_string())
    }

    /// Hash several byte strings as one, length-prefixing each part so
    /// `["ab", "c"]` and `["a", "bc"]` differ.
    pub fn of_parts<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A path without its first component (the module root).
///
/// `module/templates/web.yaml` becomes `templates/web.yaml`. A path with a
/// single component is returned as is; the result never has a root.
pub fn short_path(path: &Path) -> PathBuf {
    let mut components = path
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_) | Component::CurDir));
    let first = components.next();
    let rest: PathBuf = components.collect();
    if rest.as_os_str().is_empty() {
        first
            .map(|c| PathBuf::from(c.as_os_str()))
            .unwrap_or_default()
    } else {
        rest
    }
}

/// A parsed manifest together with where it came from.
///
/// The document stays generic; typed views are converted on demand and never
/// cached, so a stored object is immutable once built.
#[derive(Debug, Clone)]
pub struct StoredObject {
    source_path: PathBuf,
    content_hash: ContentHash,
    content: serde_yaml::Value,
    line: Option<u32>,
}

impl StoredObject {
    /// Wrap a document parsed from `raw`.
    pub fn new(source_path: impl Into<PathBuf>, raw: &[u8], content: serde_yaml::Value) -> Self {
        Self {
            source_path: source_path.into(),
            content_hash: ContentHash::of(raw),
            content,
            line: None,
        }
    }

    /// Set the line the document starts on.
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn content_hash(&self) -> &ContentHash {
        &self.content_hash
    }

    pub fn content(&self) -> &serde_yaml::Value {
        &self.content
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    /// The source path without its module root. See [`short_path`].
    pub fn short_path(&self) -> PathBuf {
        short_path(&self.source_path)
    }

    fn str_at(&self, path: &[&str]) -> Option<&str> {
        let mut value = &self.content;
        for key in path {
            value = value.get(*key)?;
        }
        value.as_str()
    }

    fn string_map_at(&self, key: &str) -> BTreeMap<String, String> {
        let Some(mapping) = self
            .content
            .get("metadata")
            .and_then(|m| m.get(key))
            .and_then(|v| v.as_mapping())
        else {
            return BTreeMap::new();
        };

        mapping
            .iter()
            .filter_map(|(k, v)| {
                let value = match v {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    _ => return None,
                };
                Some((k.as_str()?.to_string(), value))
            })
            .collect()
    }

    /// Declared kind; empty when the document has none.
    pub fn kind(&self) -> &str {
        self.str_at(&["kind"]).unwrap_or_default()
    }

    pub fn api_version(&self) -> &str {
        self.str_at(&["apiVersion"]).unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.str_at(&["metadata", "name"]).unwrap_or_default()
    }

    /// `metadata.namespace`; empty for cluster-scoped or unset.
    pub fn namespace(&self) -> &str {
        self.str_at(&["metadata", "namespace"]).unwrap_or_default()
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.string_map_at("labels")
    }

    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.string_map_at("annotations")
    }

    /// Identity computed from the document itself.
    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::new(self.kind(), self.namespace(), self.name())
    }

    /// `Kind/name`, the object id used in findings.
    pub fn object_id(&self) -> String {
        format!("{}/{}", self.kind(), self.name())
    }

    /// Typed pod-controller view.
    pub fn pod_controller(&self) -> Projection<PodController> {
        project_pod_controller(self.kind(), &self.content)
    }

    /// Typed `v1/Service` view.
    pub fn service(&self) -> Projection<Service> {
        if self.kind() != "Service" {
            return Projection::NotApplicable;
        }
        match convert_document(&self.content, "Service", "v1 Service") {
            Ok(service) => Projection::Converted(service),
            Err(err) => Projection::Failed(err),
        }
    }

    pub fn get_service(&self) -> Result<Option<Service>, ConversionError> {
        self.service().into_result()
    }

    pub fn get_containers(&self) -> Result<Vec<Container>, ConversionError> {
        Ok(self
            .pod_controller()
            .into_result()?
            .map(|c| c.containers().to_vec())
            .unwrap_or_default())
    }

    pub fn get_init_containers(&self) -> Result<Vec<Container>, ConversionError> {
        Ok(self
            .pod_controller()
            .into_result()?
            .map(|c| c.init_containers().to_vec())
            .unwrap_or_default())
    }

    /// Main containers followed by init containers.
    pub fn get_all_containers(&self) -> Result<Vec<Container>, ConversionError> {
        Ok(self
            .pod_controller()
            .into_result()?
            .map(|c| c.all_containers())
            .unwrap_or_default())
    }

    pub fn get_pod_security_context(&self) -> Result<Option<PodSecurityContext>, ConversionError> {
        Ok(self
            .pod_controller()
            .into_result()?
            .and_then(|c| c.pod_security_context().cloned()))
    }

    pub fn is_host_network(&self) -> Result<bool, ConversionError> {
        Ok(self
            .pod_controller()
            .into_result()?
            .is_some_and(|c| c.host_network()))
    }

    pub fn pod_template_labels(&self) -> Result<BTreeMap<String, String>, ConversionError> {
        Ok(self
            .pod_controller()
            .into_result()?
            .map(|c| c.template_labels())
            .unwrap_or_default())
    }
}

impl From<RawManifest> for StoredObject {
    fn from(manifest: RawManifest) -> Self {
        StoredObject::new(manifest.source_path, &manifest.raw, manifest.document)
            .with_line(manifest.line)
    }
}
