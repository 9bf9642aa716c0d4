//! Sidecar file naming and the bone-list side-file schema.
//!
//! A skin document persists next to the project data as
//! `<sanitized mesh name>.skinstack`; the bone-list side-file is a simpler
//! JSON for bulk bone reuse across meshes, independent of the layer schema.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DocError;

/// Fixed extension for sidecar documents.
pub const SIDECAR_EXTENSION: &str = "skinstack";

/// Bone-list side-file schema version.
pub const BONE_LIST_VERSION: &str = "1.0";

/// Characters that cannot appear in a sidecar file name.
const UNSAFE_CHARS_PATTERN: &str = r#"[\\/:*?"<>|]"#;

static UNSAFE_CHARS_REGEX: OnceLock<Regex> = OnceLock::new();

fn unsafe_chars_regex() -> &'static Regex {
    UNSAFE_CHARS_REGEX
        .get_or_init(|| Regex::new(UNSAFE_CHARS_PATTERN).expect("invalid regex pattern"))
}

/// Replaces filesystem-unsafe characters and spaces in a mesh display name
/// with underscores.
pub fn sanitize_mesh_name(name: &str) -> String {
    unsafe_chars_regex()
        .replace_all(name, "_")
        .replace(' ', "_")
}

/// The sidecar file name for a mesh display name.
pub fn sidecar_file_name(mesh_name: &str) -> String {
    format!("{}.{}", sanitize_mesh_name(mesh_name), SIDECAR_EXTENSION)
}

/// The bone-list side-file: `{"version", "count", "bones"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoneListFile {
    /// Schema version.
    pub version: String,
    /// Number of bones, kept alongside the list for quick inspection.
    pub count: usize,
    /// Bone names in deformer order.
    pub bones: Vec<String>,
}

impl BoneListFile {
    /// Wraps a bone-name list in the side-file schema.
    pub fn new(bones: Vec<String>) -> Self {
        Self {
            version: BONE_LIST_VERSION.to_string(),
            count: bones.len(),
            bones,
        }
    }

    /// Parses a side-file from JSON.
    pub fn from_json(json: &str) -> Result<Self, DocError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the side-file to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, DocError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
