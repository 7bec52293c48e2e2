//! Core types for the manifests linter.
//!
//! - `Severity` - Finding severity levels
//! - `RuleId` - Rule identifiers (e.g., "vpa", "pdb")
//! - `Finding` - A single rule violation with its reporting context

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

/// Severity levels for findings.
///
/// Ordered from most severe to least severe:
/// `Error > Warning > Info > Ignore`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Violations that fail the module
    #[default]
    Error,
    /// Violations that should be addressed
    Warning,
    /// Informational notes
    Info,
    /// Recorded but never reported as a problem
    Ignore,
}

impl Severity {
    /// Parse a severity from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warning" | "warn" => Some(Self::Warning),
            "info" => Some(Self::Info),
            "ignore" | "ignored" | "off" => Some(Self::Ignore),
            _ => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Ignore => "ignore",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Error => 3,
            Self::Warning => 2,
            Self::Info => 1,
            Self::Ignore => 0,
        }
    }

    /// Lower this severity to at most `max`. Never raises it.
    pub fn clamp_to(self, max: Severity) -> Severity {
        std::cmp::min(self, max)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A rule identifier (e.g., "vpa", "binding-subject").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(pub String);

impl RuleId {
    /// Create a new rule id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RuleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RuleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for RuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A finding produced while checking a module.
///
/// Context fields are filled from the reporter that recorded it; any of them
/// may be absent when the finding is not tied to a rule, module or object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// The rule that produced the finding.
    pub rule_id: Option<RuleId>,
    /// The module being evaluated.
    pub module_id: Option<String>,
    /// The offending object, usually `Kind/name`.
    pub object_id: Option<String>,
    /// Source file, relative to the module root where possible.
    pub file_path: Option<PathBuf>,
    /// Line number in the source file (1-indexed).
    pub line: Option<u32>,
    /// The effective severity after clamping.
    pub severity: Severity,
    /// A human-readable message.
    pub message: String,
    /// Optional offending value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl Finding {
    /// Create a finding with only a severity and a message.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule_id: None,
            module_id: None,
            object_id: None,
            file_path: None,
            line: None,
            severity,
            message: message.into(),
            value: None,
        }
    }

    /// Render `file:line` (or just the file) for display.
    pub fn location(&self) -> Option<String> {
        let path = self.file_path.as_ref()?;
        Some(match self.line {
            Some(line) => format!("{}:{}", path.display(), line),
            None => path.display().to_string(),
        })
    }
}
