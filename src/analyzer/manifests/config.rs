//! Configuration for the manifests linter.
//!
//! Provides:
//! - Per-rule exclusion entries and severity caps
//! - Path ignoring
//! - Failure threshold
//! - Module namespace override

use crate::analyzer::manifests::exclusions::{
    ContainerExclusions, ContainerRuleExclusion, ExclusionMode, KindRuleExclusion,
    ObjectExclusions, RuleExclusions,
};
use crate::analyzer::manifests::types::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default config file names, tried in order.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[".modcheck.yaml", ".modcheck.yml"];

/// Settings for a single rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSettings {
    /// Severity cap for findings of this rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Severity>,

    /// Objects this rule skips.
    #[serde(default)]
    pub exclude: Vec<KindRuleExclusion>,

    /// Containers (or whole objects) this rule skips.
    #[serde(default)]
    pub exclude_containers: Vec<ContainerRuleExclusion>,
}

/// Configuration for the manifests linter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestsConfig {
    /// Module namespace. Overrides the module's `.namespace` file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// How exclusion lists with several entries are evaluated.
    #[serde(default)]
    pub exclusion_mode: ExclusionMode,

    /// Findings at or above this severity fail the run.
    #[serde(default)]
    pub failure_threshold: Severity,

    /// Glob patterns, relative to the module root, for files to skip.
    #[serde(default)]
    pub ignore_paths: Vec<String>,

    /// Per-rule settings keyed by rule id.
    #[serde(default)]
    pub rules: BTreeMap<String, RuleSettings>,

    /// If true, never return a non-zero exit code.
    #[serde(default)]
    pub no_fail: bool,
}

impl Default for ManifestsConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            exclusion_mode: ExclusionMode::AnyEntry,
            failure_threshold: Severity::Error,
            ignore_paths: Vec::new(),
            rules: BTreeMap::new(),
            no_fail: false,
        }
    }
}

impl ManifestsConfig {
    /// Create a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the module namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_exclusion_mode(mut self, mode: ExclusionMode) -> Self {
        self.exclusion_mode = mode;
        self
    }

    /// Set the failure threshold.
    pub fn with_threshold(mut self, threshold: Severity) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Add a path pattern to ignore.
    pub fn ignore_path(mut self, pattern: impl Into<String>) -> Self {
        self.ignore_paths.push(pattern.into());
        self
    }

    /// Exclude an object from a rule.
    pub fn exclude(mut self, rule: &str, kind: &str, name: &str) -> Self {
        self.rules
            .entry(rule.to_string())
            .or_default()
            .exclude
            .push(KindRuleExclusion::new(kind, name));
        self
    }

    /// Exclude a container from a rule. A trailing `*` matches by prefix.
    pub fn exclude_container(mut self, rule: &str, kind: &str, name: &str, container: &str) -> Self {
        self.rules
            .entry(rule.to_string())
            .or_default()
            .exclude_containers
            .push(ContainerRuleExclusion::new(kind, name, Some(container)));
        self
    }

    /// Cap the severity of a rule.
    pub fn with_rule_level(mut self, rule: &str, level: Severity) -> Self {
        self.rules.entry(rule.to_string()).or_default().level = Some(level);
        self
    }

    /// Severity cap configured for `rule`.
    pub fn rule_level(&self, rule: &str) -> Option<Severity> {
        self.rules.get(rule).and_then(|s| s.level)
    }

    /// Exclusions configured for `rule`.
    pub fn exclusions_for(&self, rule: &str) -> RuleExclusions {
        let Some(settings) = self.rules.get(rule) else {
            return RuleExclusions::default();
        };
        RuleExclusions {
            objects: ObjectExclusions::new(settings.exclude.clone(), self.exclusion_mode),
            containers: ContainerExclusions::new(
                settings.exclude_containers.clone(),
                self.exclusion_mode,
            ),
        }
    }

    /// Check if a file path should be ignored based on ignore_paths patterns.
    pub fn should_ignore_path(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.ignore_paths.iter().any(|pattern| {
            glob::Pattern::new(pattern)
                .map(|glob| glob.matches(&path_str))
                .unwrap_or(false)
        })
    }

    /// Load configuration from a YAML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_from_str(&content)
    }

    /// Load configuration from a YAML string. An empty document yields the
    /// default configuration.
    pub fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Try to load config from the default file names in `dir`.
    pub fn load_from_default(dir: &Path) -> Result<Option<Self>, ConfigError> {
        for filename in DEFAULT_CONFIG_FILES {
            let path = dir.join(filename);
            if path.is_file() {
                log::debug!("loading config from {}", path.display());
                return Self::load_from_file(&path).map(Some);
            }
        }
        Ok(None)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for pattern in &self.ignore_paths {
            if let Err(e) = glob::Pattern::new(pattern) {
                return Err(ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                });
            }
        }
        for (rule, settings) in &self.rules {
            if let Some(entry) = settings
                .exclude
                .iter()
                .find(|e| e.kind.is_empty() || e.name.is_empty())
            {
                return Err(ConfigError::InvalidExclusion {
                    rule: rule.clone(),
                    message: format!("entry {:?} needs both kind and name", entry),
                });
            }
            if let Some(entry) = settings
                .exclude_containers
                .iter()
                .find(|e| e.kind.is_empty() || e.name.is_empty())
            {
                return Err(ConfigError::InvalidExclusion {
                    rule: rule.clone(),
                    message: format!("entry {:?} needs both kind and name", entry),
                });
            }
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid ignore pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("invalid exclusion for rule {rule}: {message}")]
    InvalidExclusion { rule: String, message: String },
}
