//! JSON formatter.

use crate::analyzer::manifests::lint::LintResult;
use crate::analyzer::manifests::types::Finding;
use serde::Serialize;

/// Format lint results as JSON.
pub fn format(results: &[LintResult]) -> String {
    let output = JsonOutput::from(results);
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

#[derive(Serialize)]
struct JsonOutput {
    modules: Vec<JsonModule>,
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonModule {
    module: String,
    findings: Vec<JsonFinding>,
    objects_indexed: usize,
    documents_parsed: usize,
}

#[derive(Serialize)]
struct JsonFinding {
    rule: Option<String>,
    severity: String,
    message: String,
    object: Option<String>,
    file_path: Option<String>,
    line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct JsonSummary {
    modules: usize,
    total_findings: usize,
    errors: usize,
}

impl From<&[LintResult]> for JsonOutput {
    fn from(results: &[LintResult]) -> Self {
        let modules: Vec<JsonModule> = results
            .iter()
            .map(|r| JsonModule {
                module: r.module.clone(),
                findings: r.reportable().map(JsonFinding::from).collect(),
                objects_indexed: r.summary.objects_indexed,
                documents_parsed: r.summary.documents_parsed,
            })
            .collect();
        let total_findings = modules.iter().map(|m| m.findings.len()).sum();
        let errors = modules
            .iter()
            .flat_map(|m| &m.findings)
            .filter(|f| f.severity == "error")
            .count();

        Self {
            summary: JsonSummary {
                modules: modules.len(),
                total_findings,
                errors,
            },
            modules,
        }
    }
}

impl From<&Finding> for JsonFinding {
    fn from(f: &Finding) -> Self {
        Self {
            rule: f.rule_id.as_ref().map(|r| r.to_string()),
            severity: f.severity.to_string(),
            message: f.message.clone(),
            object: f.object_id.clone(),
            file_path: f.file_path.as_ref().map(|p| p.display().to_string()),
            line: f.line,
            value: f.value.clone(),
        }
    }
}
