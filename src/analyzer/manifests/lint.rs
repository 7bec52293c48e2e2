//! Module evaluation.
//!
//! Ties together ingestion, the resource store and the cross-resource checks:
//! parse a module directory, index its objects, run every check and collect
//! the findings.

use crate::analyzer::manifests::cache::ResultCache;
use crate::analyzer::manifests::checks::{self, CheckContext, MANIFEST_RULE};
use crate::analyzer::manifests::config::ManifestsConfig;
use crate::analyzer::manifests::errors::{FindingSink, Reporter};
use crate::analyzer::manifests::parser::{ManifestError, ParsedManifests, parse_manifests, parse_module_dir};
use crate::analyzer::manifests::storage::{ContentHash, ResourceStore, StoreError, StoredObject, short_path};
use crate::analyzer::manifests::types::{Finding, Severity};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// File in a module directory holding the module namespace.
pub const NAMESPACE_FILE: &str = ".namespace";

/// The module being evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleContext {
    /// Module name, usually the directory name.
    pub name: String,
    /// Namespace the module deploys into; empty when unknown.
    pub namespace: String,
    /// Module directory, if evaluated from disk.
    pub path: Option<PathBuf>,
}

impl ModuleContext {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            path: None,
        }
    }

    /// Build the context for a module directory. The namespace comes from
    /// `config.namespace` or else from the directory's `.namespace` file.
    pub fn from_dir(path: &Path, config: &ManifestsConfig) -> Result<Self, LintError> {
        if !path.is_dir() {
            return Err(LintError::NotADirectory(path.to_path_buf()));
        }
        let name = path
            .canonicalize()
            .ok()
            .as_deref()
            .unwrap_or(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let namespace = match &config.namespace {
            Some(namespace) => namespace.clone(),
            None => read_namespace_file(path)?,
        };

        Ok(Self {
            name,
            namespace,
            path: Some(path.to_path_buf()),
        })
    }
}

fn read_namespace_file(module_dir: &Path) -> Result<String, LintError> {
    let path = module_dir.join(NAMESPACE_FILE);
    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(content.trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("{} has no {} file", module_dir.display(), NAMESPACE_FILE);
            Ok(String::new())
        }
        Err(source) => Err(LintError::Namespace { path, source }),
    }
}

/// Module-level failures that prevent evaluation.
#[derive(Debug, thiserror::Error)]
pub enum LintError {
    #[error("{} is not a module directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to read module namespace from {}: {source}", path.display())]
    Namespace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of evaluating one module.
#[derive(Debug, Clone)]
pub struct LintResult {
    pub module: String,
    /// Findings in the order they were reported.
    pub findings: Vec<Finding>,
    pub summary: LintSummary,
}

/// Summary of a module evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintSummary {
    /// Documents that parsed.
    pub documents_parsed: usize,
    /// Objects that made it into the store.
    pub objects_indexed: usize,
    /// Number of checks run.
    pub checks_run: usize,
}

impl LintResult {
    /// Findings that should be shown (everything above `Ignore`).
    pub fn reportable(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity > Severity::Ignore)
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    /// Check if there are any warnings.
    pub fn has_warnings(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Warning)
    }

    /// Get the maximum reportable severity in the results.
    pub fn max_severity(&self) -> Option<Severity> {
        self.reportable().map(|f| f.severity).max()
    }

    /// Check if the results should cause a non-zero exit.
    pub fn should_fail(&self, config: &ManifestsConfig) -> bool {
        if config.no_fail {
            return false;
        }
        self.max_severity()
            .is_some_and(|max| max >= config.failure_threshold)
    }
}

fn report_store_error(reporter: &Reporter<'_>, error: &StoreError, object_id: &str, line: Option<u32>) {
    let reporter = match error {
        StoreError::Duplicate { second_path, .. } => reporter.with_file_path(short_path(second_path)),
        StoreError::MissingIdentity { path } => reporter.with_file_path(short_path(path)),
    };
    let reporter = match line {
        Some(line) => reporter.with_line(line),
        None => reporter,
    };
    let reporter = if object_id.is_empty() {
        reporter
    } else {
        reporter.with_object(object_id)
    };
    match error {
        StoreError::Duplicate { identity, .. } => {
            reporter.error_with_value(error.to_string(), identity.to_string());
        }
        StoreError::MissingIdentity { .. } => reporter.error(error.to_string()),
    }
}

/// Evaluate already parsed manifests of one module.
pub fn lint_documents(parsed: ParsedManifests, ctx: &ModuleContext, config: &ManifestsConfig) -> LintResult {
    let sink = FindingSink::new();
    let reporter = sink.reporter().with_module(ctx.name.as_str());
    let manifest_reporter = {
        let r = reporter.with_rule(MANIFEST_RULE);
        match config.rule_level(MANIFEST_RULE) {
            Some(level) => r.with_max_level(level),
            None => r,
        }
    };

    for error in &parsed.errors {
        let r = manifest_reporter.with_file_path(short_path(error.path()));
        let r = match error.line() {
            Some(line) => r.with_line(line),
            None => r,
        };
        r.error(error.to_string());
    }

    let mut summary = LintSummary {
        documents_parsed: parsed.manifests.len(),
        ..Default::default()
    };

    let mut store = ResourceStore::new();
    for manifest in parsed.manifests {
        let object = StoredObject::from(manifest);
        let object_id = if object.kind().is_empty() || object.name().is_empty() {
            String::new()
        } else {
            object.object_id()
        };
        let line = object.line();
        if let Err(err) = store.insert_object(object) {
            report_store_error(&manifest_reporter, &err, &object_id, line);
        }
    }
    summary.objects_indexed = store.len();
    log::debug!(
        "module {}: {} objects indexed from {} documents",
        ctx.name,
        summary.objects_indexed,
        summary.documents_parsed
    );

    let check_ctx = CheckContext {
        store: &store,
        module_name: &ctx.name,
        namespace: &ctx.namespace,
        config,
    };
    checks::run_all(&check_ctx, &reporter);
    summary.checks_run = checks::builtin_checks().len();
    store.close();

    LintResult {
        module: ctx.name.clone(),
        findings: sink.into_findings(),
        summary,
    }
}

/// Evaluate manifests given as YAML text, as if they lived in `path`.
pub fn lint_content(content: &str, path: &Path, ctx: &ModuleContext, config: &ManifestsConfig) -> LintResult {
    lint_documents(parse_manifests(content, path), ctx, config)
}

/// Evaluate one module directory.
pub fn lint_module(path: &Path, config: &ManifestsConfig) -> Result<LintResult, LintError> {
    let ctx = ModuleContext::from_dir(path, config)?;
    let parsed = parse_module_dir(path, |p| config.should_ignore_path(p));
    Ok(lint_documents(parsed, &ctx, config))
}

/// Hash everything that determines the result of a module evaluation.
fn module_fingerprint(parsed: &ParsedManifests, ctx: &ModuleContext, config: &ManifestsConfig) -> ContentHash {
    let config_text = serde_yaml::to_string(config).unwrap_or_default();
    let error_text: Vec<String> = parsed.errors.iter().map(ManifestError::to_string).collect();

    let mut parts: Vec<&[u8]> = vec![ctx.name.as_bytes(), ctx.namespace.as_bytes(), config_text.as_bytes()];
    for manifest in &parsed.manifests {
        parts.push(manifest.source_path.as_os_str().as_encoded_bytes());
        parts.push(&manifest.raw);
    }
    parts.extend(error_text.iter().map(|e| e.as_bytes()));
    ContentHash::of_parts(parts)
}

/// Evaluate one module directory, reusing a cached result when nothing that
/// feeds the evaluation changed.
pub fn lint_module_cached(
    path: &Path,
    config: &ManifestsConfig,
    cache: &ResultCache<LintResult>,
) -> Result<LintResult, LintError> {
    let ctx = ModuleContext::from_dir(path, config)?;
    let parsed = parse_module_dir(path, |p| config.should_ignore_path(p));
    let fingerprint = module_fingerprint(&parsed, &ctx, config);
    Ok(cache.get_or_insert_with(&fingerprint, || lint_documents(parsed, &ctx, config)))
}

/// Evaluate several module directories in parallel. Results keep the order
/// of `paths`; every module gets its own store and finding sink.
pub fn lint_modules(
    paths: &[PathBuf],
    config: &ManifestsConfig,
    cache: &ResultCache<LintResult>,
) -> Vec<Result<LintResult, LintError>> {
    paths
        .par_iter()
        .map(|path| lint_module_cached(path, config, cache))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::manifests::checks::{VPA_RULE, PDB_RULE};

    const WEB: &str = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: ns1
spec:
  selector:
    matchLabels:
      app: web
  template:
    metadata:
      labels:
        app: web
    spec:
      containers:
      - name: api
---
apiVersion: policy/v1
kind: PodDisruptionBudget
metadata:
  name: web
  namespace: ns1
spec:
  minAvailable: 1
  selector:
    matchLabels:
      app: web
"#;

    const WEB_VPA: &str = r#"
apiVersion: autoscaling.k8s.io/v1
kind: VerticalPodAutoscaler
metadata:
  name: web
  namespace: ns1
spec:
  targetRef:
    apiVersion: apps/v1
    kind: Deployment
    name: web
  updatePolicy:
    updateMode: Auto
  resourcePolicy:
    containerPolicies:
    - containerName: api
      minAllowed:
        cpu: 10m
        memory: 10Mi
      maxAllowed:
        cpu: 100m
        memory: 100Mi
"#;

    fn ctx() -> ModuleContext {
        ModuleContext::new("example", "ns1")
    }

    #[test]
    fn test_worked_example() {
        let content = format!("{}---{}", WEB, WEB_VPA);
        let result = lint_content(&content, Path::new("example/templates/web.yaml"), &ctx(), &ManifestsConfig::default());
        assert!(result.findings.is_empty(), "{:?}", result.findings);
        assert_eq!(result.summary.objects_indexed, 3);

        let result = lint_content(WEB, Path::new("example/templates/web.yaml"), &ctx(), &ManifestsConfig::default());
        assert_eq!(result.findings.len(), 1);
        let finding = &result.findings[0];
        assert_eq!(finding.rule_id.as_ref().map(|r| r.as_str()), Some(VPA_RULE));
        assert_eq!(finding.object_id.as_deref(), Some("Deployment/web"));
        assert_eq!(finding.module_id.as_deref(), Some("example"));
        assert_eq!(finding.file_path.as_deref(), Some(Path::new("templates/web.yaml")));
        assert_eq!(finding.line, Some(1));
        assert!(result.has_errors());
    }

    #[test]
    fn test_duplicates_and_syntax_errors_are_findings() {
        let content = format!("{}---{}---{}---\nkey: [unclosed\n", WEB, WEB_VPA, WEB_VPA);
        let result = lint_content(&content, Path::new("example/templates/web.yaml"), &ctx(), &ManifestsConfig::default());

        let manifest: Vec<_> = result
            .findings
            .iter()
            .filter(|f| f.rule_id.as_ref().map(|r| r.as_str()) == Some(MANIFEST_RULE))
            .collect();
        assert_eq!(manifest.len(), 2);
        assert!(manifest[0].message.contains("invalid YAML"));
        assert!(manifest[1].message.contains("defined more than once"));
        assert_eq!(manifest[1].object_id.as_deref(), Some("VerticalPodAutoscaler/web"));
        // The duplicate does not disturb the checks.
        assert_eq!(result.findings.len(), 2);
    }

    #[test]
    fn test_should_fail_threshold() {
        let config = ManifestsConfig::default().with_rule_level(VPA_RULE, Severity::Warning);
        let result = lint_content(WEB, Path::new("example/web.yaml"), &ctx(), &config);
        assert!(result.has_warnings());
        assert!(!result.should_fail(&config));

        let strict = config.clone().with_threshold(Severity::Warning);
        assert!(result.should_fail(&strict));

        let ignored = ManifestsConfig::default()
            .with_rule_level(VPA_RULE, Severity::Ignore)
            .with_threshold(Severity::Info);
        let result = lint_content(WEB, Path::new("example/web.yaml"), &ctx(), &ignored);
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.reportable().count(), 0);
        assert!(!result.should_fail(&ignored));
    }

    #[test]
    fn test_lint_module_reads_namespace_file() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("example");
        std::fs::create_dir_all(module.join("templates")).unwrap();
        std::fs::write(module.join(NAMESPACE_FILE), "ns1\n").unwrap();
        std::fs::write(module.join("templates/web.yaml"), WEB).unwrap();

        let result = lint_module(&module, &ManifestsConfig::default()).unwrap();
        assert_eq!(result.module, "example");
        assert_eq!(result.findings.len(), 1);

        let config = ManifestsConfig::default().with_namespace("other");
        let ctx = ModuleContext::from_dir(&module, &config).unwrap();
        assert_eq!(ctx.namespace, "other");
    }

    #[test]
    fn test_lint_module_skips_ignored_paths() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("example");
        std::fs::create_dir_all(module.join("tests")).unwrap();
        std::fs::write(module.join(NAMESPACE_FILE), "ns1").unwrap();
        std::fs::write(module.join("tests/web.yaml"), WEB).unwrap();

        let config = ManifestsConfig::default().ignore_path("tests/**");
        let result = lint_module(&module, &config).unwrap();
        assert!(result.findings.is_empty());
        assert_eq!(result.summary.documents_parsed, 0);
    }

    #[test]
    fn test_lint_module_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("web.yaml");
        std::fs::write(&file, WEB).unwrap();
        assert!(matches!(
            lint_module(&file, &ManifestsConfig::default()),
            Err(LintError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_lint_modules_parallel_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for (name, ns) in [("alpha", "ns1"), ("beta", "ns2")] {
            let module = dir.path().join(name);
            std::fs::create_dir_all(&module).unwrap();
            std::fs::write(module.join(NAMESPACE_FILE), ns).unwrap();
            std::fs::write(module.join("web.yaml"), WEB).unwrap();
            paths.push(module);
        }

        let cache = ResultCache::new();
        let config = ManifestsConfig::default();
        let results = lint_modules(&paths, &config, &cache);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().module, "alpha");
        assert_eq!(results[1].as_ref().unwrap().module, "beta");
        assert_eq!(cache.len(), 2);

        let again = lint_modules(&paths, &config, &cache);
        assert_eq!(cache.len(), 2);
        assert_eq!(
            again[0].as_ref().unwrap().findings,
            results[0].as_ref().unwrap().findings
        );

        // The module namespace only scopes binding subjects.
        let beta = results[1].as_ref().unwrap();
        assert!(beta
            .findings
            .iter()
            .all(|f| f.rule_id.as_ref().map(|r| r.as_str()) != Some(PDB_RULE)));
    }
}
