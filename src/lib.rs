//! tf-isolate
//!
//! Isolates a single resource, together with what it uses and what
//! exclusively uses it, out of a tree of generated Terraform configuration.
//!
//! ## Pipeline
//!
//! ```text
//! generated/                      ResourceGraph
//! ├── global/                         │  (global/ overrides duplicates)
//! │   └── networks.tf   ──load──►     │
//! ├── us-east1/                       ▼
//! │   └── instances.tf            Rewriter ◄── CertificateMap (ssl_certificates.tf)
//! └── ...                             │  remote-state outputs -> direct references
//!                                     ▼
//!                                 extract(key) ──► <name>.tf
//! ```
//!
//! ## Features
//!
//! - **Override rule**: files under a `global` directory replace same-keyed
//!   resources declared elsewhere
//! - **Reference rewriting**: `data.<...>.outputs.<key>_self_links`
//!   interpolations become `<kind>.<name>.self_link`
//! - **Bounded closure**: resources shared by several users are left out
//!   unless they are the target

pub mod certs;
pub mod config;
pub mod error;
pub mod graph;
pub mod pipeline;

pub use certs::CertificateMap;
pub use config::{ExtractOrder, IsolateConfig};
pub use error::{CertificateError, ExtractError, GraphError, IsolateError, Result};
pub use graph::{extract, load_from_directory, Extraction, ResourceGraph, ResourceKey, ResourceNode, Rewriter};
pub use pipeline::{isolate, IsolateRequest};
