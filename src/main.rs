use anyhow::{Context, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod classifier;
mod cli;
mod config;
mod discovery;
mod error;
mod finder;
mod gemini;
mod pipeline;
mod progress;
mod sidecar;
mod taxonomy;
mod util;
mod writer;

use crate::cli::Args;
use crate::config::{load_file_config, resolve_settings, Settings};
use crate::error::PipelineError;
use crate::finder::WalkdirRawFinder;
use crate::gemini::GeminiClassifier;
use crate::pipeline::{Pipeline, RunInputs, RunResult};
use crate::progress::Progress;
use crate::sidecar::FsSidecarChecker;
use crate::writer::ExiftoolWriter;

const LOG_ENV: &str = "PHOTO_TAGGER_LOG";

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Pipeline errors already render their cause.
            match err.downcast_ref::<PipelineError>() {
                Some(pipeline_err) => eprintln!("Error: {pipeline_err}"),
                None => eprintln!("Error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(args: &Args) -> Result<()> {
    let file_config = load_file_config(args.config.as_deref())?;
    let settings = resolve_settings(args, file_config, |key| std::env::var(key).ok());
    if args.verbose {
        print_settings(args, &settings);
    }

    let classifier = GeminiClassifier::new(&settings.api_base, settings.request_timeout);
    let writer = ExiftoolWriter::new(&settings.run.exiftool_path);
    let progress = Progress::new(!args.json && std::io::stderr().is_terminal());
    let inputs = RunInputs {
        image_dir: args.image_dir.clone(),
        raw_search_root: args.raw_search_root.clone(),
        taxonomy_path: args.taxonomy.clone(),
    };

    let (finder, sidecars) = (WalkdirRawFinder, FsSidecarChecker);
    let result = Pipeline::new(&finder, &sidecars, &classifier, &writer)
        .with_progress(progress)
        .run(&inputs, &settings.run)?;

    if args.json {
        print_json(&result)?;
    } else {
        print_summary(args, &result);
    }
    Ok(())
}

fn print_settings(args: &Args, settings: &Settings) {
    eprintln!("Image directory: {}", args.image_dir.display());
    eprintln!("RAW search root: {}", args.raw_search_root.display());
    eprintln!("Taxonomy file: {}", args.taxonomy.display());
    eprintln!("Model: {}", settings.run.model);
    eprintln!("Thinking budget: {}", settings.run.thinking_budget);
    eprintln!("exiftool: {}", settings.run.exiftool_path);
    eprintln!("RAW extensions: {}", settings.run.raw_extensions.join(", "));
}

fn print_summary(args: &Args, result: &RunResult) {
    println!("Tagged {} file(s).", result.keywords.len());
    if !args.verbose {
        return;
    }
    for (raw, keywords) in &result.keywords {
        let name = util::display_path(raw, Some(&args.raw_search_root));
        println!("  {name}: {}", keywords.join(", "));
        if let Some(rejected) = result.rejected.get(raw) {
            println!("    dropped (not in taxonomy): {}", rejected.join(", "));
        }
    }
}

#[derive(serde::Serialize)]
struct JsonReport<'a> {
    keywords: &'a BTreeMap<PathBuf, Vec<String>>,
    rejected: &'a BTreeMap<PathBuf, Vec<String>>,
}

fn print_json(result: &RunResult) -> Result<()> {
    let report = JsonReport {
        keywords: &result.keywords,
        rejected: &result.rejected,
    };
    let text = serde_json::to_string_pretty(&report).context("serialize result JSON")?;
    println!("{text}");
    Ok(())
}
