// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DocMerger — merge heterogeneous documents into one PDF or DOCX.
//
// Entry point. Initialises logging, loads configuration, runs the pipeline
// over the given files and writes the result.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use docmerger_core::messages::Locale;
use docmerger_core::{MergeConfig, Status, TargetKind};
use docmerger_pipeline::{InputDescriptor, Pipeline};

#[derive(Debug, Parser)]
#[command(name = "docmerger", version, about = "Merge documents into one PDF or DOCX")]
struct Cli {
    /// Output format: pdf or docx.
    #[arg(short = 'f', long = "format", default_value = "pdf")]
    format: TargetKind,

    /// Output file; defaults to merged.<format> in the current directory.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration file; missing keys take their defaults.
    #[arg(long, env = "DOCMERGER_CONFIG")]
    config: Option<PathBuf>,

    /// Write diagnostic documents in Hebrew.
    #[arg(long)]
    hebrew: bool,

    /// Extract text one input at a time.
    #[arg(long)]
    sequential: bool,

    /// Input files, merged in the order given.
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match MergeConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, path = %path.display(), "cannot load configuration");
                return ExitCode::FAILURE;
            }
        },
        None => MergeConfig::default(),
    };
    if cli.hebrew {
        config.locale = Locale::Hebrew;
    }
    if cli.sequential {
        config.parallel_extraction = false;
    }

    tracing::info!(files = cli.files.len(), format = ?cli.format, "DocMerger starting");

    let inputs = cli.files.iter().map(InputDescriptor::file).collect();
    let outcome = match Pipeline::new(config).run(inputs, cli.format).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "no output document could be produced");
            return ExitCode::FAILURE;
        }
    };

    for diagnostic in &outcome.diagnostics {
        tracing::warn!(
            kind = ?diagnostic.kind,
            source = %diagnostic.source,
            "{}",
            diagnostic.message
        );
    }

    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from(format!("merged.{}", outcome.target.extension())));
    if let Err(e) = tokio::fs::write(&output, &outcome.output_bytes).await {
        tracing::error!(error = %e, path = %output.display(), "cannot write output");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        status = ?outcome.status,
        path = %output.display(),
        bytes_len = outcome.output_bytes.len(),
        "Output written"
    );
    match outcome.status {
        Status::Success | Status::PartialSuccess => ExitCode::SUCCESS,
        Status::Fallback => ExitCode::from(2),
    }
}
