//! Plain text formatter.

use crate::analyzer::manifests::lint::LintResult;
use crate::analyzer::manifests::types::{Finding, Severity};
use colored::Colorize;

fn severity_label(severity: Severity, color: bool) -> String {
    let label = severity.as_str();
    if !color {
        return label.to_string();
    }
    match severity {
        Severity::Error => label.red().bold().to_string(),
        Severity::Warning => label.yellow().to_string(),
        Severity::Info => label.blue().to_string(),
        Severity::Ignore => label.dimmed().to_string(),
    }
}

fn format_finding(finding: &Finding, color: bool) -> String {
    let location = finding.location().unwrap_or_else(|| "-".to_string());
    let rule = finding
        .rule_id
        .as_ref()
        .map(|r| r.as_str())
        .unwrap_or("-");
    let object = finding.object_id.as_deref().unwrap_or("-");

    let mut line = format!(
        "{}: [{}] {} ({}) - {}",
        location,
        severity_label(finding.severity, color),
        rule,
        object,
        finding.message,
    );
    if let Some(value) = &finding.value {
        line.push_str(&format!(" (value: {})", value));
    }
    line.push('\n');
    line
}

/// Format lint results as plain text, grouped by module.
pub fn format(results: &[LintResult], color: bool) -> String {
    let mut output = String::new();
    let mut total = 0;

    for result in results {
        let findings: Vec<_> = result.reportable().collect();
        if findings.is_empty() {
            continue;
        }
        let header = format!("Module {}:", result.module);
        if color {
            output.push_str(&header.bold().to_string());
        } else {
            output.push_str(&header);
        }
        output.push('\n');
        for finding in &findings {
            output.push_str("  ");
            output.push_str(&format_finding(finding, color));
        }
        total += findings.len();
    }

    if total == 0 {
        output.push_str("No lint errors found.\n");
    } else {
        output.push_str(&format!(
            "\nFound {} issue(s) in {} module(s).\n",
            total,
            results.iter().filter(|r| r.reportable().next().is_some()).count()
        ));
    }

    output
}

/// Format for GitHub Actions annotations.
pub fn format_github(results: &[LintResult]) -> String {
    let mut output = String::new();

    for result in results {
        for finding in result.reportable() {
            let level = match finding.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Info | Severity::Ignore => "notice",
            };
            let file = finding
                .file_path
                .as_ref()
                .map(|p| format!("{}/{}", result.module, p.display()))
                .unwrap_or_else(|| result.module.clone());
            let line = finding.line.unwrap_or(1);
            let rule = finding.rule_id.as_ref().map(|r| r.as_str()).unwrap_or("-");

            output.push_str(&format!(
                "::{} file={},line={}::[{}] {} - {}\n",
                level,
                file,
                line,
                rule,
                finding.object_id.as_deref().unwrap_or("-"),
                finding.message,
            ));
        }
    }

    output
}
