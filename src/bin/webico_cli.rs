//! WebIco CLI - batch conversion front end
//!
//! Commands: convert, check
//! Outputs JSON to stdout, logs to stderr
//! Exit codes: 0 all items done, 2 some items failed, 1 run failed

use chrono::Utc;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use webico_core::{
    BatchConfig, BatchReport, ConversionItem, ConversionOrchestrator, FileCandidate,
    FileValidator, IconSize, ItemStatus, Mode, Quality,
};

#[derive(Parser)]
#[command(name = "webico-cli")]
#[command(about = "WebIco CLI - convert PNG, JPEG and SVG to WebP or ICO")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert files (directories are expanded one level)
    Convert {
        /// Input files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output encoding: webp or ico
        #[arg(short, long)]
        mode: Option<Mode>,

        /// WebP quality, 0.5 to 1.0
        #[arg(short, long)]
        quality: Option<f32>,

        /// ICO size: 32, 64, 128 or 256
        #[arg(short = 's', long)]
        icon_size: Option<u32>,

        /// JSON config file (flags override it)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory the output is written to
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Report which inputs would be accepted
    Check {
        /// Input files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Convert { paths, mode, quality, icon_size, config, out_dir } => {
            let config = match build_config(config.as_deref(), mode, quality, icon_size) {
                Ok(c) => c,
                Err(e) => return fail(&e),
            };
            convert(&paths, config, &out_dir).await
        }
        Commands::Check { paths } => check(&paths),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn fail(message: &dyn std::fmt::Display) -> ExitCode {
    let output = serde_json::json!({
        "success": false,
        "error": message.to_string(),
    });
    println!("{output}");
    ExitCode::FAILURE
}

fn build_config(
    path: Option<&Path>,
    mode: Option<Mode>,
    quality: Option<f32>,
    icon_size: Option<u32>,
) -> Result<BatchConfig, webico_core::ConfigError> {
    let mut config = match path {
        Some(p) => BatchConfig::load_from_file(p)?,
        None => BatchConfig::default(),
    };
    if let Some(mode) = mode {
        config.mode = mode;
    }
    if let Some(q) = quality {
        config.quality = Quality::new(q)?;
    }
    if let Some(size) = icon_size {
        config.icon_size = IconSize::try_from(size)?;
    }
    Ok(config)
}

/// Files as given; directories contribute their files sorted by name.
fn expand_paths(paths: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut files = vec![];
    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = fs::read_dir(path)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .collect();
            entries.sort();
            files.extend(entries);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn check(paths: &[PathBuf]) -> ExitCode {
    let files = match expand_paths(paths) {
        Ok(f) => f,
        Err(e) => return fail(&e),
    };
    let validator = FileValidator::new();
    let (accepted, rejected): (Vec<_>, Vec<_>) = files.iter().partition(|path| {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        validator.accepts(&FileCandidate::new(name, None, Vec::new()))
    });

    let display = |paths: Vec<&PathBuf>| -> Vec<String> {
        paths.iter().map(|p| p.display().to_string()).collect()
    };
    let output = serde_json::json!({
        "accepted": display(accepted),
        "rejected": display(rejected),
    });
    match serde_json::to_string_pretty(&output) {
        Ok(s) => {
            println!("{s}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

async fn convert(paths: &[PathBuf], config: BatchConfig, out_dir: &Path) -> ExitCode {
    let files = match expand_paths(paths) {
        Ok(f) => f,
        Err(e) => return fail(&e),
    };

    let mut candidates = Vec::with_capacity(files.len());
    for path in &files {
        match FileCandidate::from_path(path) {
            Ok(c) => candidates.push(c),
            Err(e) => {
                error!(path = %path.display(), error = %e, "could not read input");
                return fail(&format!("Failed to read {}: {}", path.display(), e));
            }
        }
    }

    let orchestrator = ConversionOrchestrator::default();
    let accepted = match orchestrator.submit(candidates) {
        Ok(n) => n,
        Err(e) => return fail(&e),
    };
    if accepted == 0 {
        return fail(&"No supported input files (png, jpg, jpeg, svg)");
    }

    let started_at = Utc::now();
    let observer = |index: usize, item: &ConversionItem| match item.status {
        ItemStatus::Done => info!(index, file = %item.name, "done"),
        ItemStatus::Error => warn!(
            index,
            file = %item.name,
            detail = item.detail.as_deref().unwrap_or_default(),
            "error"
        ),
        _ => {}
    };

    let outcome = match orchestrator.run_observed(config, &observer).await {
        Ok(o) => o,
        Err(e) => return fail(&e),
    };

    let output_path = match &outcome.output {
        Some(artifact) => {
            let path = out_dir.join(&artifact.filename);
            if let Err(e) = fs::create_dir_all(out_dir).and_then(|_| fs::write(&path, &artifact.bytes)) {
                return fail(&format!("Failed to write {}: {}", path.display(), e));
            }
            info!(path = %path.display(), size = artifact.bytes.len(), "output written");
            Some(path.display().to_string())
        }
        None => None,
    };

    let report = match BatchReport::new(config, &outcome, started_at) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let output = serde_json::json!({
        "success": true,
        "outputPath": output_path,
        "report": report,
    });
    match serde_json::to_string_pretty(&output) {
        Ok(s) => println!("{s}"),
        Err(e) => return fail(&e),
    }

    if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2) // Some items failed
    }
}
