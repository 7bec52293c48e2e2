//! Analyzers for rendered module manifests.

pub mod manifests;
