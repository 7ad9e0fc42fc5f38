//! tf-isolate-all CLI
//!
//! Runs `tf-isolate` once for every resource of a type, one process per
//! resource, writing `<output-dir>/<name>.tf` for each.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use clap::Parser;
use tf_isolate::pipeline::{discover_names, output_path};
use tf_isolate::{IsolateConfig, IsolateError};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tf-isolate-all")]
#[command(about = "Extract every resource of a type into its own file")]
#[command(after_help = "Example: tf-isolate-all generated/google google_compute_instance out/ ssl_certificates.tf")]
struct Cli {
    /// Root of the generated configuration tree
    input_dir: PathBuf,

    /// Resource type to fan out over
    kind: String,

    /// Directory receiving one file per resource
    output_dir: PathBuf,

    /// File declaring the SSL certificate data sources
    cert_file: PathBuf,

    /// Configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Extractor binary (defaults to tf-isolate next to this executable)
    #[arg(long)]
    extractor: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tf_isolate=info,tf_isolate_all=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            eprintln!("{} extraction(s) failed", failed);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

/// Returns the number of failed extractions
fn run(cli: Cli) -> Result<usize, IsolateError> {
    let config = IsolateConfig::load_from(cli.config.as_deref())?;
    let extractor = cli
        .extractor
        .or_else(|| config.fanout.extractor.clone())
        .unwrap_or_else(default_extractor);

    let names = discover_names(&cli.input_dir, &cli.kind, &config)?;
    tracing::info!(kind = %cli.kind, resources = names.len(), "discovered resources");

    std::fs::create_dir_all(&cli.output_dir).map_err(|source| IsolateError::Write {
        path: cli.output_dir.clone(),
        source,
    })?;

    let mut failed = 0;
    for name in &names {
        let output = output_path(&cli.output_dir, name, &config.scan.extension);
        let mut command = Command::new(&extractor);
        command
            .arg(&cli.input_dir)
            .arg(&cli.kind)
            .arg(name)
            .arg(&output)
            .arg(&cli.cert_file);
        if let Some(path) = &cli.config {
            command.arg("--config").arg(path);
        }

        match command.status() {
            Ok(status) if status.success() => {
                tracing::info!(%name, output = %output.display(), "extracted");
            }
            Ok(status) => {
                tracing::warn!(%name, code = ?status.code(), "extraction failed");
                failed += 1;
            }
            Err(e) => {
                tracing::warn!(%name, extractor = %extractor.display(), error = %e, "failed to launch extractor");
                failed += 1;
            }
        }
    }

    Ok(failed)
}

fn default_extractor() -> PathBuf {
    let name = format!("tf-isolate{}", std::env::consts::EXE_SUFFIX);
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&name)))
        .filter(|path| path.exists())
        .unwrap_or_else(|| Path::new(&name).to_path_buf())
}
