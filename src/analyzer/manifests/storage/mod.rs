//! Resource store: every rendered object of a module, keyed by identity.
//!
//! The store is filled once per module evaluation and then only read by the
//! cross-resource checks. Iteration follows identity order, so two passes
//! over the same store always visit objects in the same order.

pub mod kinds;
pub mod object;

pub use kinds::{ControllerKind, ConversionError, PodController, Projection};
pub use object::{ContentHash, StoredObject, short_path};

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// `(kind, namespace, name)` of a manifest object.
///
/// Cluster-scoped objects use an empty namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceIdentity {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceIdentity {
    pub fn new(kind: impl Into<String>, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// A legacy pattern under which duplicate identities are expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePattern {
    Prefix(&'static str),
    Contains(&'static str),
}

impl DuplicatePattern {
    pub fn matches(&self, identity: &str) -> bool {
        match self {
            Self::Prefix(prefix) => identity.starts_with(prefix),
            Self::Contains(needle) => identity.contains(needle),
        }
    }
}

/// Identities matching one of these may be rendered more than once.
pub const ALLOWED_DUPLICATES: &[DuplicatePattern] = &[
    DuplicatePattern::Prefix("GrafanaDashboardDefinition/"),
    DuplicatePattern::Contains("CustomPrometheusRules/"),
];

fn is_allowed_duplicate(identity: &ResourceIdentity) -> bool {
    let rendered = identity.to_string();
    ALLOWED_DUPLICATES.iter().any(|p| p.matches(&rendered))
}

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The identity is already taken; the first object was kept.
    #[error("object {identity} is defined more than once (first in {}, again in {})", first_path.display(), second_path.display())]
    Duplicate {
        identity: ResourceIdentity,
        first_path: PathBuf,
        second_path: PathBuf,
    },

    /// The document has no kind or no name.
    #[error("object in {} has no kind or metadata.name", path.display())]
    MissingIdentity { path: PathBuf },
}

/// In-memory index of a module's rendered objects.
#[derive(Debug, Default)]
pub struct ResourceStore {
    objects: BTreeMap<ResourceIdentity, StoredObject>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object under `identity`.
    ///
    /// The first object stored under an identity is kept. A later insert with
    /// the same identity returns [`StoreError::Duplicate`] unless the identity
    /// is on the legacy allow-list, in which case it is dropped silently.
    pub fn put(&mut self, identity: ResourceIdentity, object: StoredObject) -> Result<(), StoreError> {
        if let Some(existing) = self.objects.get(&identity) {
            if is_allowed_duplicate(&identity) {
                log::debug!("keeping first definition of allowed duplicate {}", identity);
                return Ok(());
            }
            return Err(StoreError::Duplicate {
                first_path: existing.source_path().to_path_buf(),
                second_path: object.source_path().to_path_buf(),
                identity,
            });
        }

        self.objects.insert(identity, object);
        Ok(())
    }

    /// Insert an object under the identity declared in its document.
    pub fn insert_object(&mut self, object: StoredObject) -> Result<(), StoreError> {
        if object.kind().is_empty() || object.name().is_empty() {
            return Err(StoreError::MissingIdentity {
                path: object.source_path().to_path_buf(),
            });
        }
        self.put(object.identity(), object)
    }

    pub fn get(&self, identity: &ResourceIdentity) -> Option<&StoredObject> {
        self.objects.get(identity)
    }

    pub fn exists(&self, identity: &ResourceIdentity) -> bool {
        self.objects.contains_key(identity)
    }

    /// Drop every entry. The store can be filled again afterwards.
    pub fn close(&mut self) {
        self.objects.clear();
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All objects in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (&ResourceIdentity, &StoredObject)> {
        self.objects.iter()
    }

    /// Objects whose kind is exactly `kind`.
    pub fn objects_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a StoredObject> + 'a {
        self.objects
            .iter()
            .filter(move |(id, _)| id.kind == kind)
            .map(|(_, obj)| obj)
    }

    /// Objects of the pod-controller kinds.
    pub fn pod_controllers(&self) -> impl Iterator<Item = (ControllerKind, &StoredObject)> {
        self.objects
            .iter()
            .filter_map(|(id, obj)| ControllerKind::from_kind(&id.kind).map(|k| (k, obj)))
    }
}
