//! Resource Loading
//!
//! Walks a configuration tree, parses every configuration file, and registers
//! resource blocks into a `ResourceGraph` under the global override rule.

use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use super::ResourceGraph;
use crate::config::ScanConfig;
use crate::error::GraphError;

/// Load resources from a filesystem directory.
///
/// Files that cannot be read or parsed are logged and skipped. A failure of
/// the directory walk itself aborts the build.
pub fn load_from_directory(root: &Path, config: &ScanConfig) -> Result<ResourceGraph, GraphError> {
    let mut graph = ResourceGraph::new();
    let mut files = 0usize;

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        if path.extension().map(|e| e != config.extension.as_str()).unwrap_or(true) {
            continue;
        }

        let relative_path = path.strip_prefix(root).map_err(|_| GraphError::OutsideRoot {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        })?;
        let relative_str = relative_path.to_string_lossy();
        if config.skip_prefixes.iter().any(|p| relative_str.starts_with(p)) {
            continue;
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read file, skipping");
                continue;
            }
        };

        let body = match hcl::parse(&content) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "invalid HCL, skipping");
                continue;
            }
        };

        let global = is_global(relative_path, &config.global_segment);
        let kept = graph.register_body(body, global);
        files += 1;
        tracing::trace!(path = %path.display(), global, kept, "scanned");
    }

    tracing::info!(
        files,
        resources = graph.node_count(),
        "loaded configuration tree from {}",
        root.display()
    );
    Ok(graph)
}

/// Whether a file lives under a directory named `segment`
pub fn is_global(path: &Path, segment: &str) -> bool {
    path.parent()
        .map(|dir| dir.components().any(|c| c.as_os_str() == segment))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn block_text(graph: &ResourceGraph, key: &str) -> String {
        hcl::to_string(&graph.get(key).unwrap().block).unwrap()
    }

    #[test]
    fn test_is_global() {
        assert!(is_global(&PathBuf::from("gen/global/networks/net.tf"), "global"));
        assert!(is_global(&PathBuf::from("global/net.tf"), "global"));
        assert!(!is_global(&PathBuf::from("gen/us-east1/net.tf"), "global"));
        assert!(!is_global(&PathBuf::from("gen/globally/net.tf"), "global"));
        assert!(!is_global(&PathBuf::from("global.tf"), "global"));
    }

    #[test]
    fn test_global_wins_when_walked_first() {
        let dir = tempfile::tempdir().unwrap();
        // a/ sorts before b/, so the global file is walked first
        write(dir.path(), "a/global/net.tf", r#"resource "t" "net" { origin = "global" }"#);
        write(dir.path(), "b/regional/net.tf", r#"resource "t" "net" { origin = "regional" }"#);

        let graph = load_from_directory(dir.path(), &ScanConfig::default()).unwrap();
        assert_eq!(graph.node_count(), 1);
        assert!(block_text(&graph, "t_net").contains("global"));
    }

    #[test]
    fn test_global_wins_when_walked_last() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a/regional/net.tf", r#"resource "t" "net" { origin = "regional" }"#);
        write(dir.path(), "b/global/net.tf", r#"resource "t" "net" { origin = "global" }"#);

        let graph = load_from_directory(dir.path(), &ScanConfig::default()).unwrap();
        assert_eq!(graph.node_count(), 1);
        let text = block_text(&graph, "t_net");
        assert!(text.contains("global"));
        assert!(!text.contains("regional"));
    }

    #[test]
    fn test_first_non_global_declaration_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a/net.tf", r#"resource "t" "net" { origin = "first" }"#);
        write(dir.path(), "b/net.tf", r#"resource "t" "net" { origin = "second" }"#);

        let graph = load_from_directory(dir.path(), &ScanConfig::default()).unwrap();
        assert!(block_text(&graph, "t_net").contains("first"));
    }

    #[test]
    fn test_unparseable_and_foreign_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.tf", r#"resource "t" "good" {}"#);
        write(dir.path(), "broken.tf", "resource \"t\" \"broken\" {");
        write(dir.path(), "notes.txt", r#"resource "t" "txt" {}"#);

        let graph = load_from_directory(dir.path(), &ScanConfig::default()).unwrap();
        assert_eq!(graph.keys(), vec!["t_good"]);
    }

    #[test]
    fn test_every_directory_is_visited_by_default() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".terraform/x.tf", r#"resource "t" "a" {}"#);
        write(dir.path(), ".git/y.tf", r#"resource "t" "b" {}"#);
        write(dir.path(), "svc/.terraform/z.tf", r#"resource "t" "c" {}"#);

        let graph = load_from_directory(dir.path(), &ScanConfig::default()).unwrap();
        assert_eq!(graph.keys(), vec!["t_a", "t_b", "t_c"]);
    }

    #[test]
    fn test_configured_prefixes_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.tf", r#"resource "t" "good" {}"#);
        write(dir.path(), ".terraform/modules/m.tf", r#"resource "t" "cached" {}"#);

        let config = ScanConfig {
            skip_prefixes: vec![".terraform/".to_string()],
            ..ScanConfig::default()
        };
        let graph = load_from_directory(dir.path(), &config).unwrap();
        assert_eq!(graph.keys(), vec!["t_good"]);
    }

    #[test]
    fn test_missing_root_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");

        let result = load_from_directory(&missing, &ScanConfig::default());
        assert!(matches!(result, Err(GraphError::Walk(_))));
    }

    #[test]
    fn test_custom_global_segment() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a/net.tf", r#"resource "t" "net" { origin = "regional" }"#);
        write(dir.path(), "b/shared/net.tf", r#"resource "t" "net" { origin = "shared" }"#);

        let config = ScanConfig {
            global_segment: "shared".to_string(),
            ..ScanConfig::default()
        };
        let graph = load_from_directory(dir.path(), &config).unwrap();
        assert!(block_text(&graph, "t_net").contains("shared"));
    }
}
