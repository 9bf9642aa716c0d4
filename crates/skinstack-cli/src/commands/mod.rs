//! CLI command implementations

pub mod bake;
pub mod export_bones;
pub mod show;
pub mod validate;

use anyhow::{Context, Result};
use skinstack_doc::SkinDocument;
use std::fs;
use std::path::Path;

/// Loads a sidecar document from disk with CLI-grade error context.
pub fn load_sidecar(path: &str) -> Result<SkinDocument> {
    let json = fs::read_to_string(Path::new(path))
        .with_context(|| format!("Failed to read sidecar file: {}", path))?;
    SkinDocument::from_json(&json).with_context(|| format!("Failed to parse sidecar: {}", path))
}
