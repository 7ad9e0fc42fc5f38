//! End-to-end isolation runs
//!
//! build graph -> certificate map -> rewrite -> extract -> write

use std::fs;
use std::path::{Path, PathBuf};

use crate::certs::CertificateMap;
use crate::config::{ExtractOrder, IsolateConfig};
use crate::error::{IsolateError, Result};
use crate::graph::rewrite::Rewriter;
use crate::graph::{extract, load_from_directory, normalize_label, resource_key, Extraction, ResourceGraph};

/// One extractor invocation
#[derive(Debug, Clone)]
pub struct IsolateRequest {
    /// Root of the generated configuration tree
    pub input_dir: PathBuf,
    /// Resource type of the target
    pub kind: String,
    /// Local name of the target
    pub name: String,
    /// File receiving the extracted configuration
    pub output: PathBuf,
    /// File declaring certificate data sources
    pub cert_file: PathBuf,
    /// Block order of the output
    pub order: ExtractOrder,
}

impl IsolateRequest {
    /// Resource key of the target
    pub fn key(&self) -> String {
        resource_key(&self.kind, &self.name)
    }
}

/// Load the tree and certificates, and rewrite all references
pub fn prepare(input_dir: &Path, cert_file: &Path, config: &IsolateConfig) -> Result<ResourceGraph> {
    let mut graph = load_from_directory(input_dir, &config.scan)?;
    let certs = CertificateMap::from_file(cert_file)?;
    Rewriter::new(&certs, &config.rewrite).rewrite_all(&mut graph);
    Ok(graph)
}

/// Run one extraction and write its output file
pub fn isolate(request: &IsolateRequest, config: &IsolateConfig) -> Result<Extraction> {
    let graph = prepare(&request.input_dir, &request.cert_file, config)?;
    let extraction = extract(&graph, &request.key(), request.order)?;

    let content = extraction.to_hcl()?;
    fs::write(&request.output, content).map_err(|source| IsolateError::Write {
        path: request.output.clone(),
        source,
    })?;

    tracing::info!(
        resources = extraction.keys.len(),
        "wrote {} to {}",
        extraction.target,
        request.output.display()
    );
    Ok(extraction)
}

/// Local names of every resource of `kind` in the tree
pub fn discover_names(input_dir: &Path, kind: &str, config: &IsolateConfig) -> Result<Vec<String>> {
    let graph = load_from_directory(input_dir, &config.scan)?;
    Ok(graph.names_of_kind(kind))
}

/// Output file for one fanned-out extraction
pub fn output_path(output_dir: &Path, name: &str, extension: &str) -> PathBuf {
    output_dir.join(format!("{}.{}", normalize_label(name), extension))
}
