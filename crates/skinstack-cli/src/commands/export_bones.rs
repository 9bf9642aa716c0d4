//! Export-bones command implementation
//!
//! Writes a sidecar document's cached bone list as the bone-list side-file,
//! for bulk bone reuse across meshes.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use skinstack_doc::BoneListFile;
use std::fs;
use std::process::ExitCode;

use super::load_sidecar;

/// Run the export-bones command
///
/// # Arguments
/// * `sidecar_path` - Path to the sidecar file
/// * `output` - Path for the bone-list side-file
///
/// # Returns
/// Exit code: 0 success, 1 when the sidecar has no bone cache
pub fn run(sidecar_path: &str, output: &str) -> Result<ExitCode> {
    let doc = load_sidecar(sidecar_path)?;
    if doc.bones.is_empty() {
        bail!("sidecar has no cached bone list; save it from a live deformer first");
    }

    let file = BoneListFile::new(doc.bones);
    fs::write(output, file.to_json_pretty()?)
        .with_context(|| format!("Failed to write bone list: {}", output))?;

    println!(
        "{} {} bone(s) -> {}",
        "SUCCESS".green().bold(),
        file.count,
        output
    );
    Ok(ExitCode::SUCCESS)
}
