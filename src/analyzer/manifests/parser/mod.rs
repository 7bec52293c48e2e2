//! Manifest ingestion and value parsing.

pub mod quantity;
pub mod yaml;

pub use yaml::{ManifestError, ParsedManifests, RawManifest, parse_manifests, parse_module_dir};
