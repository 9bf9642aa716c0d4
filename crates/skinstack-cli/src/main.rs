//! skinstack CLI - Command-line interface for skin-weight sidecar files
//!
//! This binary provides pipeline-side commands for inspecting, validating,
//! and baking the layered skin-weight sidecars the in-host tooling writes.

use clap::{Parser, Subcommand};
use std::process::ExitCode;

mod commands;

/// skinstack - Layered Skin-Weight Tooling
#[derive(Parser)]
#[command(name = "skinstack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a layer-stack summary for a sidecar file
    Show {
        /// Path to the sidecar file
        #[arg(short, long)]
        sidecar: String,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Validate a sidecar file without modifying it
    Validate {
        /// Path to the sidecar file
        #[arg(short, long)]
        sidecar: String,

        /// Output machine-readable JSON diagnostics (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Flatten the layer stack and collapse it to a single base layer
    Bake {
        /// Path to the sidecar file
        #[arg(short, long)]
        sidecar: String,

        /// Output file path (default: overwrite input file)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Write the sidecar's cached bone list as a bone-list side-file
    ExportBones {
        /// Path to the sidecar file
        #[arg(short, long)]
        sidecar: String,

        /// Path for the bone-list side-file
        #[arg(short, long)]
        output: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Show { sidecar, json } => commands::show::run(&sidecar, json),
        Commands::Validate { sidecar, json } => commands::validate::run(&sidecar, json),
        Commands::Bake { sidecar, output } => commands::bake::run(&sidecar, output.as_deref()),
        Commands::ExportBones { sidecar, output } => {
            commands::export_bones::run(&sidecar, &output)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}
