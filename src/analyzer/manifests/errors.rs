//! Finding accumulation.
//!
//! A [`FindingSink`] is the single append-only list of findings for one
//! module evaluation. Rules never touch it directly: they report through a
//! [`Reporter`], which pairs a borrowed sink with an immutable
//! [`FindingContext`]. Every `with_*` call returns a new reporter carrying a
//! copy of the context with one more field set, so reporters handed to
//! different rules or objects never see each other's context.

use crate::analyzer::manifests::types::{Finding, RuleId, Severity};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// Append-only list of findings.
#[derive(Debug, Default)]
pub struct FindingSink {
    findings: Mutex<Vec<Finding>>,
}

impl FindingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reporter with an empty context.
    pub fn reporter(&self) -> Reporter<'_> {
        Reporter {
            sink: self,
            context: FindingContext::default(),
        }
    }

    fn push(&self, finding: Finding) {
        self.findings.lock().push(finding);
    }

    /// Snapshot of all findings in insertion order.
    pub fn findings(&self) -> Vec<Finding> {
        self.findings.lock().clone()
    }

    /// Consume the sink and return its findings in insertion order.
    pub fn into_findings(self) -> Vec<Finding> {
        self.findings.into_inner()
    }

    /// Number of recorded findings.
    pub fn len(&self) -> usize {
        self.findings.lock().len()
    }

    /// Whether no findings were recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any finding reached error severity.
    pub fn contains_errors(&self) -> bool {
        self.findings
            .lock()
            .iter()
            .any(|f| f.severity >= Severity::Error)
    }
}

/// Default context attached to findings recorded through a [`Reporter`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindingContext {
    pub rule_id: Option<RuleId>,
    pub module_id: Option<String>,
    pub object_id: Option<String>,
    pub file_path: Option<PathBuf>,
    pub line: Option<u32>,
    /// Upper bound for the severity of findings added through this context.
    pub max_level: Option<Severity>,
}

/// A view over a [`FindingSink`] with a fixed reporting context.
#[derive(Debug, Clone)]
pub struct Reporter<'a> {
    sink: &'a FindingSink,
    context: FindingContext,
}

impl<'a> Reporter<'a> {
    fn derive(&self, update: impl FnOnce(&mut FindingContext)) -> Reporter<'a> {
        let mut context = self.context.clone();
        update(&mut context);
        Reporter {
            sink: self.sink,
            context,
        }
    }

    /// The context attached to findings from this reporter.
    pub fn context(&self) -> &FindingContext {
        &self.context
    }

    pub fn with_rule(&self, rule_id: impl Into<RuleId>) -> Reporter<'a> {
        let rule_id = rule_id.into();
        self.derive(|c| c.rule_id = Some(rule_id))
    }

    pub fn with_module(&self, module_id: impl Into<String>) -> Reporter<'a> {
        let module_id = module_id.into();
        self.derive(|c| c.module_id = Some(module_id))
    }

    pub fn with_object(&self, object_id: impl Into<String>) -> Reporter<'a> {
        let object_id = object_id.into();
        self.derive(|c| c.object_id = Some(object_id))
    }

    pub fn with_file_path(&self, path: impl AsRef<Path>) -> Reporter<'a> {
        let path = path.as_ref().to_path_buf();
        self.derive(|c| c.file_path = Some(path))
    }

    pub fn with_line(&self, line: u32) -> Reporter<'a> {
        self.derive(|c| c.line = Some(line))
    }

    /// Clamp every finding added through the returned reporter to at most
    /// `level`. Nested clamps keep the lowest bound.
    pub fn with_max_level(&self, level: Severity) -> Reporter<'a> {
        self.derive(|c| {
            c.max_level = Some(match c.max_level {
                Some(existing) => existing.clamp_to(level),
                None => level,
            })
        })
    }

    /// Record a finding at `severity`, clamped by the context.
    pub fn add(
        &self,
        severity: Severity,
        message: impl Into<String>,
        value: Option<serde_json::Value>,
    ) {
        let severity = match self.context.max_level {
            Some(max) => severity.clamp_to(max),
            None => severity,
        };
        let finding = Finding {
            rule_id: self.context.rule_id.clone(),
            module_id: self.context.module_id.clone(),
            object_id: self.context.object_id.clone(),
            file_path: self.context.file_path.clone(),
            line: self.context.line,
            severity,
            message: message.into(),
            value,
        };
        log::debug!(
            "finding [{}] {}: {}",
            finding.severity,
            finding.object_id.as_deref().unwrap_or("-"),
            finding.message
        );
        self.sink.push(finding);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.add(Severity::Error, message, None);
    }

    pub fn error_with_value(&self, message: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.add(Severity::Error, message, Some(value.into()));
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.add(Severity::Warning, message, None);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.add(Severity::Info, message, None);
    }

    /// Whether the underlying sink holds any error-level finding.
    pub fn contains_errors(&self) -> bool {
        self.sink.contains_errors()
    }
}
