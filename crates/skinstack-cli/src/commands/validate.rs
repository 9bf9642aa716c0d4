//! Validate command implementation
//!
//! Runs the advisory document checks over a sidecar file and reports coded
//! errors and warnings.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use skinstack_doc::{validate_document, ValidationError, ValidationWarning};
use std::process::ExitCode;

use super::load_sidecar;

#[derive(Serialize)]
struct JsonIssue {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

#[derive(Serialize)]
struct ValidateOutput {
    path: String,
    ok: bool,
    errors: Vec<JsonIssue>,
    warnings: Vec<JsonIssue>,
}

fn error_issue(err: &ValidationError) -> JsonIssue {
    JsonIssue {
        code: err.code.to_string(),
        message: err.message.clone(),
        path: err.path.clone(),
    }
}

fn warning_issue(warn: &ValidationWarning) -> JsonIssue {
    JsonIssue {
        code: warn.code.to_string(),
        message: warn.message.clone(),
        path: warn.path.clone(),
    }
}

/// Run the validate command
///
/// # Arguments
/// * `sidecar_path` - Path to the sidecar file
/// * `json_output` - Whether to output machine-readable JSON diagnostics
///
/// # Returns
/// Exit code: 0 if valid, 1 if invalid
pub fn run(sidecar_path: &str, json_output: bool) -> Result<ExitCode> {
    let doc = load_sidecar(sidecar_path)?;
    let result = validate_document(&doc);

    if json_output {
        let output = ValidateOutput {
            path: sidecar_path.to_string(),
            ok: result.is_ok(),
            errors: result.errors.iter().map(error_issue).collect(),
            warnings: result.warnings.iter().map(warning_issue).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(if result.is_ok() {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        });
    }

    println!("{} {}", "Validating:".cyan().bold(), sidecar_path);

    for warning in &result.warnings {
        println!("  {} {}", "!".yellow(), warning);
    }
    for error in &result.errors {
        println!("  {} {}", "x".red(), error);
    }

    if result.is_ok() {
        println!(
            "{} {} layer(s), {} warning(s)",
            "VALID".green().bold(),
            doc.layer_count(),
            result.warnings.len()
        );
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "{} {} error(s), {} warning(s)",
            "INVALID".red().bold(),
            result.errors.len(),
            result.warnings.len()
        );
        Ok(ExitCode::from(1))
    }
}
