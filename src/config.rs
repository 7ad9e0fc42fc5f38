//! Configuration management for tf-isolate
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (tf-isolate.toml)
//! - Environment variables (TF_ISOLATE__*)
//!
//! ## Example config file (tf-isolate.toml):
//! ```toml
//! [scan]
//! extension = "tf"
//! global_segment = "global"
//! skip_prefixes = [".terraform/"]
//!
//! [rewrite]
//! certificate_data_type = "google_compute_ssl_certificate"
//!
//! [extract]
//! order = "topological"
//!
//! [fanout]
//! extractor = "/usr/local/bin/tf-isolate"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IsolateConfig {
    /// Tree scan settings
    #[serde(default)]
    pub scan: ScanConfig,

    /// Reference rewrite settings
    #[serde(default)]
    pub rewrite: RewriteConfig,

    /// Extraction settings
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Fan-out settings
    #[serde(default)]
    pub fanout: FanoutConfig,
}

/// Configuration for walking the configuration tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// File extension of configuration files, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Directory name whose files override same-keyed resources elsewhere
    #[serde(default = "default_global_segment")]
    pub global_segment: String,

    /// Skip files whose path relative to the root starts with one of these.
    /// Nothing is skipped unless configured.
    #[serde(default)]
    pub skip_prefixes: Vec<String>,
}

/// Configuration for the reference rewriter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    /// Data source type referenced by rewritten `ssl_certificates`
    #[serde(default = "default_certificate_data_type")]
    pub certificate_data_type: String,
}

/// Configuration for subgraph extraction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractConfig {
    #[serde(default)]
    pub order: ExtractOrder,
}

/// Order of blocks in the extracted document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractOrder {
    /// Append order of the closure traversal
    #[default]
    Traversal,
    /// Dependencies before dependents
    Topological,
}

/// Configuration for the fan-out tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FanoutConfig {
    /// Path to the extractor binary (defaults to the sibling `tf-isolate`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extractor: Option<PathBuf>,
}

// Default value functions
fn default_extension() -> String {
    "tf".to_string()
}

fn default_global_segment() -> String {
    "global".to_string()
}

fn default_certificate_data_type() -> String {
    "google_compute_ssl_certificate".to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            global_segment: default_global_segment(),
            skip_prefixes: Vec::new(),
        }
    }
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            certificate_data_type: default_certificate_data_type(),
        }
    }
}

impl IsolateConfig {
    /// Load configuration, with an optional explicit file layered on top
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "tf-isolate.toml",
            ".tf-isolate.toml",
            "config/tf-isolate.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "tf-isolate", "tf-isolate") {
            let xdg_config = config_dir.config_dir().join("tf-isolate.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // TF_ISOLATE__SCAN__GLOBAL_SEGMENT=shared
        builder = builder.add_source(
            Environment::with_prefix("TF_ISOLATE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
