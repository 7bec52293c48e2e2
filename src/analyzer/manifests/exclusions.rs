//! Per-rule exclusion entries.
//!
//! An exclusion list is consulted before a rule evaluates an object. Two
//! flavours exist: object entries (`kind` + `name`) and container entries
//! (`kind` + `name` + optional `container`).

use serde::{Deserialize, Serialize};

/// How an exclusion list with several entries is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExclusionMode {
    /// Any matching entry suppresses the check.
    #[default]
    AnyEntry,
    /// Only the first entry is consulted. Matches the behaviour of older
    /// module tooling, where later entries were silently ignored.
    FirstEntryOnly,
}

/// Excludes one object from a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindRuleExclusion {
    pub kind: String,
    pub name: String,
}

impl KindRuleExclusion {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }

    fn matches(&self, kind: &str, name: &str) -> bool {
        self.kind == kind && self.name == name
    }
}

/// Excludes one container of an object, or the whole object when
/// `container` is unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRuleExclusion {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

impl ContainerRuleExclusion {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, container: Option<&str>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            container: container.map(str::to_string),
        }
    }

    fn matches(&self, kind: &str, name: &str, container: &str) -> bool {
        if self.kind != kind || self.name != name {
            return false;
        }
        match self.container.as_deref() {
            None => true,
            Some(pattern) => match pattern.strip_suffix('*') {
                Some(prefix) => container.starts_with(prefix),
                None => pattern == container,
            },
        }
    }
}

fn evaluate<T>(entries: &[T], mode: ExclusionMode, matches: impl Fn(&T) -> bool) -> bool {
    let excluded = match mode {
        ExclusionMode::AnyEntry => entries.iter().any(matches),
        ExclusionMode::FirstEntryOnly => entries.first().is_some_and(matches),
    };
    !excluded
}

/// Object-level exclusions of one rule.
#[derive(Debug, Clone, Default)]
pub struct ObjectExclusions {
    entries: Vec<KindRuleExclusion>,
    mode: ExclusionMode,
}

impl ObjectExclusions {
    pub fn new(entries: Vec<KindRuleExclusion>, mode: ExclusionMode) -> Self {
        Self { entries, mode }
    }

    /// Whether the rule should run for `kind`/`name`.
    pub fn enabled(&self, kind: &str, name: &str) -> bool {
        evaluate(&self.entries, self.mode, |e| e.matches(kind, name))
    }

    pub fn entries(&self) -> &[KindRuleExclusion] {
        &self.entries
    }
}

/// Container-level exclusions of one rule.
#[derive(Debug, Clone, Default)]
pub struct ContainerExclusions {
    entries: Vec<ContainerRuleExclusion>,
    mode: ExclusionMode,
}

impl ContainerExclusions {
    pub fn new(entries: Vec<ContainerRuleExclusion>, mode: ExclusionMode) -> Self {
        Self { entries, mode }
    }

    /// Whether the rule should run for `container` of `kind`/`name`.
    pub fn enabled(&self, kind: &str, name: &str, container: &str) -> bool {
        evaluate(&self.entries, self.mode, |e| e.matches(kind, name, container))
    }

    pub fn entries(&self) -> &[ContainerRuleExclusion] {
        &self.entries
    }
}

/// Exclusions that apply to one rule.
#[derive(Debug, Clone, Default)]
pub struct RuleExclusions {
    pub objects: ObjectExclusions,
    pub containers: ContainerExclusions,
}

impl RuleExclusions {
    /// Whether the rule should run for the object at all. A container entry
    /// without a container name excludes the whole object.
    pub fn object_enabled(&self, kind: &str, name: &str) -> bool {
        self.objects.enabled(kind, name)
            && !self
                .containers
                .entries()
                .iter()
                .any(|e| e.container.is_none() && e.kind == kind && e.name == name)
    }

    pub fn container_enabled(&self, kind: &str, name: &str, container: &str) -> bool {
        self.containers.enabled(kind, name, container)
    }
}
