//! Output formatters for lint results.

pub mod json;
pub mod plain;

use crate::analyzer::manifests::lint::LintResult;
use std::io::Write;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Plain text output.
    #[default]
    Plain,
    /// JSON output.
    Json,
    /// GitHub Actions annotations.
    GitHub,
}

impl OutputFormat {
    /// Parse from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "plain" | "text" => Some(Self::Plain),
            "json" => Some(Self::Json),
            "github" | "github-actions" => Some(Self::GitHub),
            _ => None,
        }
    }
}

/// Format lint results to a string. `color` only affects plain output.
pub fn format_results_to_string(results: &[LintResult], format: OutputFormat, color: bool) -> String {
    match format {
        OutputFormat::Plain => plain::format(results, color),
        OutputFormat::Json => json::format(results),
        OutputFormat::GitHub => plain::format_github(results),
    }
}

/// Format lint results into `writer`.
pub fn format_results<W: Write>(
    results: &[LintResult],
    format: OutputFormat,
    color: bool,
    writer: &mut W,
) -> std::io::Result<()> {
    writer.write_all(format_results_to_string(results, format, color).as_bytes())?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("text"), Some(OutputFormat::Plain));
        assert_eq!(OutputFormat::parse("github-actions"), Some(OutputFormat::GitHub));
        assert_eq!(OutputFormat::parse("sarif"), None);
    }

    #[test]
    fn test_format_results_writes_output() {
        let mut out = Vec::new();
        format_results(&[], OutputFormat::Json, false, &mut out).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["summary"]["modules"], 0);

        let mut out = Vec::new();
        format_results(&[], OutputFormat::Plain, false, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), plain::format(&[], false));
    }
}
