//! Show command implementation
//!
//! Prints a layer-stack summary for a sidecar file, top of stack first (the
//! order a layer panel displays).

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use skinstack_doc::{Layer, SkinDocument};
use std::process::ExitCode;

use super::load_sidecar;

#[derive(Serialize)]
struct LayerRow {
    ui_row: usize,
    name: String,
    blend_mode: String,
    opacity: f64,
    enabled: bool,
    masked: bool,
    mask_enabled: bool,
    vertices: usize,
}

#[derive(Serialize)]
struct ShowOutput {
    path: String,
    version: String,
    bone_count: usize,
    layer_count: usize,
    layers: Vec<LayerRow>,
}

fn layer_rows(doc: &SkinDocument) -> Vec<LayerRow> {
    (0..doc.layer_count())
        .filter_map(|ui| doc.layer_by_ui(ui).map(|layer| row(ui, layer)))
        .collect()
}

fn row(ui_row: usize, layer: &Layer) -> LayerRow {
    LayerRow {
        ui_row,
        name: layer.name.clone(),
        blend_mode: layer.blend_mode.to_string(),
        opacity: layer.opacity,
        enabled: layer.enabled,
        masked: layer.mask.is_some(),
        mask_enabled: layer.mask_enabled,
        vertices: layer.weights.len(),
    }
}

/// Run the show command
///
/// # Arguments
/// * `sidecar_path` - Path to the sidecar file
/// * `json_output` - Whether to output a machine-readable JSON summary
///
/// # Returns
/// Exit code: 0 on success, 1 on load failure
pub fn run(sidecar_path: &str, json_output: bool) -> Result<ExitCode> {
    let doc = load_sidecar(sidecar_path)?;

    if json_output {
        let output = ShowOutput {
            path: sidecar_path.to_string(),
            version: doc.version.clone(),
            bone_count: doc.bones.len(),
            layer_count: doc.layer_count(),
            layers: layer_rows(&doc),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{} {}", "Sidecar:".cyan().bold(), sidecar_path);
    println!(
        "{} {}   {} {}   {} {}",
        "Version:".dimmed(),
        doc.version,
        "Bones:".dimmed(),
        doc.bones.len(),
        "Layers:".dimmed(),
        doc.layer_count()
    );
    println!();

    for row in layer_rows(&doc) {
        let marker = if row.enabled {
            "o".green()
        } else {
            "-".red()
        };
        let mask = if row.masked {
            if row.mask_enabled {
                "mask".yellow().to_string()
            } else {
                "mask (off)".dimmed().to_string()
            }
        } else {
            String::new()
        };
        println!(
            "  {} [{}] {:<24} {:<9} opacity {:.2}  {} verts  {}",
            marker,
            row.ui_row,
            row.name,
            row.blend_mode,
            row.opacity,
            row.vertices,
            mask
        );
    }
    println!();
    println!("{}", "Row 0 is the top of the stack; the last row is the base layer.".dimmed());

    Ok(ExitCode::SUCCESS)
}
