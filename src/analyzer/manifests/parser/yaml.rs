//! YAML ingestion for rendered manifests.
//!
//! Splits multi-document files, keeps the raw bytes of every document (the
//! content hash is computed from them) and the line each document starts on.

use std::path::{Path, PathBuf};

/// One rendered manifest document, not yet placed in a store.
#[derive(Debug, Clone)]
pub struct RawManifest {
    /// Path of the source file, starting with the module directory name.
    pub source_path: PathBuf,
    /// Raw bytes of this document only.
    pub raw: Vec<u8>,
    /// Generic parsed document.
    pub document: serde_yaml::Value,
    /// Line in the source file where the document starts (1-indexed).
    pub line: u32,
}

/// Manifest ingestion errors.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {} at line {line}: {message}", path.display())]
    Syntax {
        path: PathBuf,
        line: u32,
        message: String,
    },
}

impl ManifestError {
    /// The file the error refers to.
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. } | Self::Syntax { path, .. } => path,
        }
    }

    /// The line the error refers to, if known.
    pub fn line(&self) -> Option<u32> {
        match self {
            Self::Io { .. } => None,
            Self::Syntax { line, .. } => Some(*line),
        }
    }
}

/// Result of parsing one or more files: documents that parsed and the errors
/// for the ones that did not.
#[derive(Debug, Default)]
pub struct ParsedManifests {
    pub manifests: Vec<RawManifest>,
    pub errors: Vec<ManifestError>,
}

impl ParsedManifests {
    fn extend(&mut self, other: ParsedManifests) {
        self.manifests.extend(other.manifests);
        self.errors.extend(other.errors);
    }
}

fn is_document_separator(line: &str) -> bool {
    match line.strip_prefix("---") {
        Some(rest) => rest.is_empty() || rest.starts_with(char::is_whitespace),
        None => false,
    }
}

/// Split YAML text into `(start line, document text)` pairs.
///
/// Documents are slices of `content`, so their bytes are exactly the input
/// bytes (line endings included). Content on a separator line after `---`
/// opens the next document on that same line.
fn split_documents(content: &str) -> Vec<(u32, &str)> {
    let mut documents = Vec::new();
    let mut doc_start = 0usize;
    let mut start_line = 1u32;
    let mut offset = 0usize;

    for (idx, line) in content.split_inclusive('\n').enumerate() {
        let text = line.trim_end_matches(['\n', '\r']);
        if is_document_separator(text) {
            documents.push((start_line, &content[doc_start..offset]));
            let rest = text[3..].trim();
            if rest.is_empty() || rest.starts_with('#') {
                doc_start = offset + line.len();
                start_line = idx as u32 + 2;
            } else {
                doc_start = offset + 3;
                start_line = idx as u32 + 1;
            }
        }
        offset += line.len();
    }
    documents.push((start_line, &content[doc_start..]));

    documents
        .into_iter()
        .filter(|(_, doc)| {
            doc.lines().any(|l| {
                let l = l.trim();
                !l.is_empty() && !l.starts_with('#')
            })
        })
        .collect()
}

/// Parse YAML content that came from `path`.
pub fn parse_manifests(content: &str, path: &Path) -> ParsedManifests {
    let mut parsed = ParsedManifests::default();

    for (line, doc) in split_documents(content) {
        match serde_yaml::from_str::<serde_yaml::Value>(doc) {
            Ok(serde_yaml::Value::Null) => {}
            Ok(document) => parsed.manifests.push(RawManifest {
                source_path: path.to_path_buf(),
                raw: doc.as_bytes().to_vec(),
                document,
                line,
            }),
            Err(e) => {
                let line = e
                    .location()
                    .map(|loc| line + loc.line().saturating_sub(1) as u32)
                    .unwrap_or(line);
                parsed.errors.push(ManifestError::Syntax {
                    path: path.to_path_buf(),
                    line,
                    message: e.to_string(),
                });
            }
        }
    }

    parsed
}

/// Parse a single YAML file, reporting it under `display_path`.
pub fn parse_manifest_file(path: &Path, display_path: &Path) -> ParsedManifests {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_manifests(&content, display_path),
        Err(source) => ParsedManifests {
            manifests: Vec::new(),
            errors: vec![ManifestError::Io {
                path: display_path.to_path_buf(),
                source,
            }],
        },
    }
}

/// Parse every `*.yaml` / `*.yml` file below a module directory.
///
/// Files are visited in name order so store population and finding order are
/// stable between runs. Source paths start with the module directory name,
/// which `StoredObject::short_path` strips again for reporting.
pub fn parse_module_dir(root: &Path, skip: impl Fn(&Path) -> bool) -> ParsedManifests {
    let mut parsed = ParsedManifests::default();
    let module_dir = root
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    for entry in walkdir::WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let entry_path = entry.path();
        if !entry_path.is_file() {
            continue;
        }
        let ext = entry_path.extension().and_then(|e| e.to_str());
        if !matches!(ext, Some("yaml") | Some("yml")) {
            continue;
        }

        let relative = entry_path.strip_prefix(root).unwrap_or(entry_path);
        if skip(relative) {
            log::debug!("skipping ignored path {}", relative.display());
            continue;
        }

        let display_path = module_dir.join(relative);
        parsed.extend(parse_manifest_file(entry_path, &display_path));
    }

    parsed
}
