//! Certificate name map
//!
//! Maps the display name of a provisioned SSL certificate to the label of the
//! `data` block that looks it up, e.g.
//!
//! ```hcl
//! data "google_compute_ssl_certificate" "frontend" {
//!   name = "frontend-cert-2021"
//! }
//! ```
//!
//! maps `frontend-cert-2021` to `frontend`.

use hcl::{Body, Expression};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::CertificateError;

/// Block identifier of data source declarations
pub const DATA_BLOCK: &str = "data";

/// Certificate display name -> data source label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateMap {
    labels: BTreeMap<String, String>,
}

impl CertificateMap {
    /// Read and parse a certificate declaration file
    pub fn from_file(path: &Path) -> Result<Self, CertificateError> {
        let content = fs::read_to_string(path).map_err(|source| CertificateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let body = hcl::parse(&content).map_err(|source| CertificateError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let map = Self::from_body(&body);
        tracing::info!(certificates = map.len(), "loaded certificate names from {}", path.display());
        Ok(map)
    }

    /// Collect `name` literals of two-labeled `data` blocks
    pub fn from_body(body: &Body) -> Self {
        let mut labels = BTreeMap::new();

        for block in body.blocks() {
            if block.identifier() != DATA_BLOCK || block.labels.len() != 2 {
                continue;
            }
            let label = block.labels[1].as_str();

            for attr in block.body.attributes() {
                if attr.key() != "name" {
                    continue;
                }
                match attr.expr() {
                    Expression::String(name) => {
                        labels.insert(name.clone(), label.to_string());
                    }
                    other => {
                        tracing::trace!(label, expr = ?other, "certificate name is not a literal, skipping");
                    }
                }
            }
        }

        Self { labels }
    }

    /// Data source label for a certificate display name
    pub fn label_for(&self, certificate: &str) -> Option<&str> {
        self.labels.get(certificate).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl FromIterator<(String, String)> for CertificateMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().collect(),
        }
    }
}
