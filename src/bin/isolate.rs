//! tf-isolate CLI
//!
//! Extracts one resource and its bounded closure from a generated tree.
//!
//! ```text
//! tf-isolate generated/google google_compute_instance web-1 web_1.tf ssl_certificates.tf
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tf_isolate::pipeline::{isolate, IsolateRequest};
use tf_isolate::{ExtractOrder, IsolateConfig, IsolateError};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tf-isolate")]
#[command(about = "Extract one resource and what it depends on into a standalone file")]
#[command(after_help = "Example: tf-isolate generated/google google_compute_instance foo-bar-disp-name compute_inst.tf ssl_certificates.tf")]
struct Cli {
    /// Root of the generated configuration tree
    input_dir: PathBuf,

    /// Resource type of the target, e.g. google_compute_instance
    kind: String,

    /// Local name of the target resource
    name: String,

    /// File to write the extracted configuration to
    output: PathBuf,

    /// File declaring the SSL certificate data sources
    cert_file: PathBuf,

    /// Configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Block order of the output (overrides configuration)
    #[arg(long, value_enum)]
    order: Option<OrderArg>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OrderArg {
    Traversal,
    Topological,
}

impl From<OrderArg> for ExtractOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::Traversal => ExtractOrder::Traversal,
            OrderArg::Topological => ExtractOrder::Topological,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tf_isolate=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), IsolateError> {
    let config = IsolateConfig::load_from(cli.config.as_deref())?;

    let request = IsolateRequest {
        input_dir: cli.input_dir,
        kind: cli.kind,
        name: cli.name,
        output: cli.output,
        cert_file: cli.cert_file,
        order: cli.order.map(ExtractOrder::from).unwrap_or(config.extract.order),
    };

    let extraction = isolate(&request, &config)?;
    for key in &extraction.skipped {
        tracing::info!(resource = %key, "left out shared resource");
    }
    Ok(())
}
