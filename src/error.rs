//! Error types for resource isolation

use std::path::PathBuf;
use thiserror::Error;

/// Result type for isolation runs
pub type Result<T> = std::result::Result<T, IsolateError>;

/// Resource graph build errors
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Failed to walk configuration tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Path {path} is outside of configuration root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },
}

/// Certificate file errors. Always fatal to a run.
#[derive(Error, Debug)]
pub enum CertificateError {
    #[error("Failed to read certificate file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid HCL in certificate file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: hcl::Error,
    },
}

/// Subgraph extraction errors
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Key not found in configuration tree: {0}")]
    KeyNotFound(String),

    #[error("Resource {key} references unknown certificate {certificate}")]
    UnresolvedCertificate { key: String, certificate: String },

    #[error("Dependency cycle through {0} prevents topological ordering")]
    Cycle(String),
}

/// Top-level errors of an isolation run
#[derive(Error, Debug)]
pub enum IsolateError {
    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] hcl::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IsolateError {
    /// Process exit status for this error. Usage errors (2) are reported by clap.
    pub fn exit_code(&self) -> u8 {
        match self {
            IsolateError::Config(_) => 3,
            IsolateError::Graph(_) => 4,
            IsolateError::Certificate(_) => 5,
            IsolateError::Extract(ExtractError::KeyNotFound(_)) => 6,
            IsolateError::Extract(ExtractError::UnresolvedCertificate { .. }) => 7,
            IsolateError::Extract(ExtractError::Cycle(_)) => 8,
            IsolateError::Serialize(_) | IsolateError::Write { .. } => 9,
        }
    }
}
