//! Bake command implementation
//!
//! Flattens a sidecar's layer stack and collapses it to a single base layer
//! holding the resolved weights — the offline face of the destructive
//! "collapse all" operation.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use skinstack_doc::{flatten, SkinDocument};
use std::fs;
use std::process::ExitCode;

use super::load_sidecar;

/// Run the bake command
///
/// # Arguments
/// * `sidecar_path` - Path to the sidecar file
/// * `output` - Output file path (default: overwrite the input file)
///
/// # Returns
/// Exit code: 0 success, 1 nothing to bake
pub fn run(sidecar_path: &str, output: Option<&str>) -> Result<ExitCode> {
    println!("{} {}", "Baking:".cyan().bold(), sidecar_path);

    let doc = load_sidecar(sidecar_path)?;
    let layer_count = doc.layer_count();

    let resolved = match flatten(&doc, None) {
        Some(resolved) if !resolved.is_empty() => resolved,
        _ => bail!("nothing to bake: the stack flattens to no weights"),
    };
    let vertices = resolved.len();

    let mut baked = SkinDocument::new();
    baked.bones = doc.bones;
    baked.layers[0].weights = resolved;

    let output_path = output.unwrap_or(sidecar_path);
    let json = baked.to_json_pretty()?;
    fs::write(output_path, json)
        .with_context(|| format!("Failed to write baked sidecar: {}", output_path))?;

    println!(
        "{} {} layer(s) collapsed into the base layer ({} vertices) -> {}",
        "SUCCESS".green().bold(),
        layer_count,
        vertices,
        output_path
    );

    Ok(ExitCode::SUCCESS)
}
