//! Reference Rewriting
//!
//! Turns the two reference shapes terraformer emits across files into direct
//! resource references and records the corresponding graph edges:
//!
//! 1. Remote-state self links:
//!    `network = "${data.terraform_remote_state.networks.outputs.google_compute_network_default_self_links}"`
//!    becomes `network = google_compute_network.default.self_link`.
//!    A single-element list around the template is unwrapped the same way.
//! 2. Certificate URLs:
//!    `ssl_certificates = ["https://.../sslCertificates/frontend-cert"]`
//!    becomes `ssl_certificates = [data.google_compute_ssl_certificate.frontend.self_link]`.
//!
//! Output references are matched on the parsed expression, certificate URLs on
//! the string literal. Rewritten values are plain traversals that match
//! neither shape, so rewriting is idempotent.

use hcl::expr::{Traversal, TraversalOperator, Variable};
use hcl::template::{Element, Template};
use hcl::{Expression, Identifier, Structure};
use petgraph::graph::NodeIndex;
use regex::Regex;

use super::ResourceGraph;
use crate::certs::CertificateMap;
use crate::config::RewriteConfig;

/// Attribute holding certificate URLs
pub const SSL_CERTIFICATES: &str = "ssl_certificates";

const DATA_ROOT: &str = "data";

/// Counts of what a rewrite pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    /// Output references replaced by direct references
    pub references: usize,
    /// Certificate URLs replaced by data source references
    pub certificates: usize,
    /// Certificate URLs whose name is not in the certificate map
    pub unresolved: usize,
}

impl std::ops::AddAssign for RewriteSummary {
    fn add_assign(&mut self, other: Self) {
        self.references += other.references;
        self.certificates += other.certificates;
        self.unresolved += other.unresolved;
    }
}

/// A change decided for one attribute
#[derive(Debug)]
enum Planned {
    Reference {
        attribute: String,
        target: NodeIndex,
        expr: Expression,
    },
    Certificate {
        attribute: String,
        expr: Expression,
    },
    Unresolved {
        certificate: String,
    },
}

/// Rewrites references of graph nodes in place
pub struct Rewriter<'a> {
    certs: &'a CertificateMap,
    certificate_data_type: String,
    /// `https://.../sslCertificates/<name>`
    certificate_url: Regex,
}

impl<'a> Rewriter<'a> {
    pub fn new(certs: &'a CertificateMap, config: &RewriteConfig) -> Self {
        Self {
            certs,
            certificate_data_type: config.certificate_data_type.clone(),
            certificate_url: Regex::new(r"^https.*sslCertificates/(.+)$")
                .expect("certificate URL pattern is valid"),
        }
    }

    /// Rewrite every node, in key order
    pub fn rewrite_all(&self, graph: &mut ResourceGraph) -> RewriteSummary {
        let mut summary = RewriteSummary::default();
        for idx in graph.indices() {
            summary += self.rewrite_node(graph, idx);
        }
        tracing::info!(
            references = summary.references,
            certificates = summary.certificates,
            unresolved = summary.unresolved,
            edges = graph.edge_count(),
            "rewrote references"
        );
        summary
    }

    /// Rewrite the attributes of one node and record its edges.
    ///
    /// Only the set of keys in the graph is consulted, so nodes can be
    /// rewritten in any order.
    pub fn rewrite_node(&self, graph: &mut ResourceGraph, idx: NodeIndex) -> RewriteSummary {
        let planned = self.plan(graph, idx);
        let mut summary = RewriteSummary::default();

        for change in planned {
            match change {
                Planned::Reference { attribute, target, expr } => {
                    set_attribute(graph, idx, &attribute, expr);
                    graph.add_reference(idx, target, &attribute);
                    summary.references += 1;
                }
                Planned::Certificate { attribute, expr } => {
                    set_attribute(graph, idx, &attribute, expr);
                    summary.certificates += 1;
                }
                Planned::Unresolved { certificate } => {
                    graph.graph[idx].unresolved_certificates.insert(certificate);
                    summary.unresolved += 1;
                }
            }
        }

        summary
    }

    fn plan(&self, graph: &ResourceGraph, idx: NodeIndex) -> Vec<Planned> {
        let node = graph.node(idx);
        let mut planned = Vec::new();

        for attr in node.block.body.attributes() {
            let key = attr.key();

            if let Some(stem) = output_reference_stem(attr.expr()) {
                match graph.index_of(&stem) {
                    Some(target) => {
                        let target_node = graph.node(target);
                        tracing::trace!(resource = %node.key(), attribute = key, self_link = %target_node.self_link(), "direct reference");
                        planned.push(Planned::Reference {
                            attribute: key.to_string(),
                            target,
                            expr: attribute_path(&target_node.kind, &[target_node.label.as_str(), "self_link"]),
                        });
                    }
                    None => {
                        tracing::trace!(resource = %node.key(), attribute = key, %stem, "no resource for output");
                    }
                }
            }

            if key == SSL_CERTIFICATES {
                let Some(certificate) = self.certificate_name(attr.expr()) else {
                    tracing::trace!(resource = %node.key(), "ssl_certificates is not a single certificate URL");
                    continue;
                };
                match self.certs.label_for(&certificate) {
                    Some(label) => planned.push(Planned::Certificate {
                        attribute: key.to_string(),
                        expr: Expression::Array(vec![attribute_path(
                            DATA_ROOT,
                            &[self.certificate_data_type.as_str(), label, "self_link"],
                        )]),
                    }),
                    None => {
                        tracing::warn!(resource = %node.key(), %certificate, "certificate not found in certificate file");
                        planned.push(Planned::Unresolved { certificate });
                    }
                }
            }
        }

        planned
    }

    /// Certificate name of a `["https://.../sslCertificates/<name>"]` value
    fn certificate_name(&self, expr: &Expression) -> Option<String> {
        let Expression::Array(items) = expr else {
            return None;
        };
        let [Expression::String(url)] = items.as_slice() else {
            return None;
        };
        self.certificate_url
            .captures(url)
            .map(|captures| captures[1].to_string())
    }
}

/// `root.attr1.attr2...` as a traversal expression
fn attribute_path(root: &str, attributes: &[&str]) -> Expression {
    let operators = attributes
        .iter()
        .map(|attr| TraversalOperator::GetAttr(Identifier::unchecked(*attr)));
    Expression::Traversal(Box::new(Traversal::new(Variable::unchecked(root), operators)))
}

fn set_attribute(graph: &mut ResourceGraph, idx: NodeIndex, key: &str, expr: Expression) {
    for structure in graph.graph[idx].block.body.iter_mut() {
        if let Structure::Attribute(attr) = structure {
            if attr.key() == key {
                attr.expr = expr;
                return;
            }
        }
    }
}

/// Resource key stem referenced by `"${data.<...>.outputs.<stem>_self_links}"`,
/// optionally wrapped in a single-element list.
pub fn output_reference_stem(expr: &Expression) -> Option<String> {
    let expr = match expr {
        Expression::Array(items) if items.len() == 1 => &items[0],
        other => other,
    };
    let path = match expr {
        Expression::TemplateExpr(template) => {
            let template = Template::from_expr(template).ok()?;
            match template.elements() {
                [Element::Interpolation(interpolation)] => traversal_path(&interpolation.expr)?,
                _ => return None,
            }
        }
        Expression::Traversal(_) => traversal_path(expr)?,
        _ => return None,
    };
    self_links_stem(&path)
}

/// Dotted segments of a plain attribute traversal such as `a.b.c`
fn traversal_path(expr: &Expression) -> Option<Vec<String>> {
    let Expression::Traversal(traversal) = expr else {
        return None;
    };
    let Expression::Variable(root) = &traversal.expr else {
        return None;
    };

    let mut path = vec![root.as_str().to_string()];
    for operator in &traversal.operators {
        match operator {
            TraversalOperator::GetAttr(ident) => path.push(ident.as_str().to_string()),
            _ => return None,
        }
    }
    Some(path)
}

/// `data.<source...>.outputs.<stem>[._]self_links` -> `<stem>`
fn self_links_stem(path: &[String]) -> Option<String> {
    let (root, rest) = path.split_first()?;
    if root != DATA_ROOT {
        return None;
    }
    let outputs = rest.iter().rposition(|segment| segment == "outputs")?;

    let output = rest[outputs + 1..].join(".");
    let stem = output.strip_suffix("self_links")?;
    let stem = stem.strip_suffix('_').or_else(|| stem.strip_suffix('.'))?;
    if stem.is_empty() {
        return None;
    }
    Some(stem.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::graph_of;

    fn expr_of(src: &str) -> Expression {
        let body = hcl::parse(&format!("x = {}\n", src)).unwrap();
        body.attributes().next().unwrap().expr().clone()
    }

    fn attribute_expr(graph: &ResourceGraph, key: &str, attribute: &str) -> Expression {
        let node = graph.get(key).unwrap();
        node.block
            .body
            .attributes()
            .find(|a| a.key() == attribute)
            .map(|a| a.expr().clone())
            .unwrap()
    }

    /// Whether an attribute still holds the value it was parsed with
    fn is_untouched(graph: &ResourceGraph, key: &str, attribute: &str) -> bool {
        attribute_expr(graph, key, attribute) == attribute_expr(&graph_of(TREE), key, attribute)
    }

    fn certs() -> CertificateMap {
        [("frontend-cert".to_string(), "frontend".to_string())]
            .into_iter()
            .collect()
    }

    const TREE: &str = r#"
resource "google_compute_network" "tfer--default" {
  name = "default"
}

resource "google_compute_subnetwork" "tfer--web" {
  name       = "web"
  network    = "${data.terraform_remote_state.networks.outputs.google_compute_network_tfer--default_self_link}"
  depends_on = []
}

resource "google_compute_instance" "web-1" {
  network    = "${data.terraform_remote_state.networks.outputs.google_compute_network_tfer--default_self_links}"
  subnetwork = ["${data.terraform_remote_state.subnets.outputs.google_compute_subnetwork_tfer--web_self_links}"]
  unknown    = "${data.terraform_remote_state.x.outputs.google_compute_network_missing_self_links}"
  zone       = "us-east1-b"
}

resource "google_compute_target_https_proxy" "proxy" {
  ssl_certificates = ["https://www.googleapis.com/compute/v1/projects/p/global/sslCertificates/frontend-cert"]
}

resource "google_compute_target_https_proxy" "orphan" {
  ssl_certificates = ["https://www.googleapis.com/compute/v1/projects/p/global/sslCertificates/gone-cert"]
}
"#;

    #[test]
    fn test_output_reference_stem() {
        assert_eq!(
            output_reference_stem(&expr_of(r#""${data.terraform_remote_state.n.outputs.google_compute_network_a_self_links}""#)),
            Some("google_compute_network_a".to_string())
        );
        assert_eq!(
            output_reference_stem(&expr_of(r#"["${data.terraform_remote_state.n.outputs.google_compute_network_a_self_links}"]"#)),
            Some("google_compute_network_a".to_string())
        );
        assert_eq!(
            output_reference_stem(&expr_of(r#""${data.remote.outputs.net.self_links}""#)),
            Some("net".to_string())
        );
        assert_eq!(
            output_reference_stem(&expr_of(r#""${data.outputs.t_a_self_links}""#)),
            Some("t_a".to_string())
        );
        assert_eq!(
            output_reference_stem(&expr_of("data.terraform_remote_state.n.outputs.t_a_self_links")),
            Some("t_a".to_string())
        );
    }

    #[test]
    fn test_output_reference_stem_rejects_other_shapes() {
        for src in [
            r#""${data.terraform_remote_state.n.outputs.a_self_link}""#,
            r#""${data.terraform_remote_state.n.outputs.a_ids}""#,
            r#""${var.n.outputs.a_self_links}""#,
            r#""${data.terraform_remote_state.n.outputs.a_self_links}-suffix""#,
            r#""${data.terraform_remote_state.n.outputs.a_self_links[0]}""#,
            r#"["${data.n.outputs.a_self_links}", "${data.n.outputs.b_self_links}"]"#,
            r#"google_compute_network.a.self_link"#,
            r#""plain""#,
        ] {
            assert_eq!(output_reference_stem(&expr_of(src)), None, "{}", src);
        }
    }

    #[test]
    fn test_rewrites_output_references() {
        let mut graph = graph_of(TREE);
        let certs = certs();
        let summary = Rewriter::new(&certs, &RewriteConfig::default()).rewrite_all(&mut graph);

        assert_eq!(summary.references, 2);
        assert_eq!(
            attribute_expr(&graph, "google_compute_instance_web-1", "network"),
            expr_of("google_compute_network.tfer__default.self_link")
        );
        // List wrapping is dropped
        assert_eq!(
            attribute_expr(&graph, "google_compute_instance_web-1", "subnetwork"),
            expr_of("google_compute_subnetwork.tfer__web.self_link")
        );
        // Unknown stems and singular outputs stay untouched
        assert!(is_untouched(&graph, "google_compute_instance_web-1", "unknown"));
        assert!(is_untouched(&graph, "google_compute_subnetwork_tfer--web", "network"));
        assert!(is_untouched(&graph, "google_compute_instance_web-1", "zone"));

        assert_eq!(
            graph.uses_keys("google_compute_instance_web-1"),
            vec!["google_compute_network_tfer--default", "google_compute_subnetwork_tfer--web"]
        );
        assert_eq!(
            graph.used_by_keys("google_compute_network_tfer--default"),
            vec!["google_compute_instance_web-1"]
        );
    }

    #[test]
    fn test_rewrites_certificates() {
        let mut graph = graph_of(TREE);
        let certs = certs();
        let summary = Rewriter::new(&certs, &RewriteConfig::default()).rewrite_all(&mut graph);

        assert_eq!(summary.certificates, 1);
        assert_eq!(summary.unresolved, 1);

        assert_eq!(
            attribute_expr(&graph, "google_compute_target_https_proxy_proxy", SSL_CERTIFICATES),
            expr_of("[data.google_compute_ssl_certificate.frontend.self_link]")
        );

        // Unknown certificates are recorded and left as they were
        let orphan = graph.get("google_compute_target_https_proxy_orphan").unwrap();
        assert!(orphan.unresolved_certificates.contains("gone-cert"));
        assert!(is_untouched(&graph, "google_compute_target_https_proxy_orphan", SSL_CERTIFICATES));
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let mut graph = graph_of(TREE);
        let certs = certs();
        let rewriter = Rewriter::new(&certs, &RewriteConfig::default());

        rewriter.rewrite_all(&mut graph);
        let edges = graph.edge_count();
        let network = attribute_expr(&graph, "google_compute_instance_web-1", "network");

        let second = rewriter.rewrite_all(&mut graph);
        assert_eq!(second.references, 0);
        assert_eq!(second.certificates, 0);
        assert_eq!(graph.edge_count(), edges);
        assert_eq!(attribute_expr(&graph, "google_compute_instance_web-1", "network"), network);
        assert_eq!(graph.used_by_keys("google_compute_subnetwork_tfer--web").len(), 1);
        assert_eq!(
            graph
                .get("google_compute_target_https_proxy_orphan")
                .unwrap()
                .unresolved_certificates
                .len(),
            1
        );
    }

    #[test]
    fn test_rewrite_order_is_irrelevant() {
        let certs = certs();
        let rewriter = Rewriter::new(&certs, &RewriteConfig::default());

        let mut forward = graph_of(TREE);
        rewriter.rewrite_all(&mut forward);

        let mut backward = graph_of(TREE);
        for idx in backward.indices().into_iter().rev() {
            rewriter.rewrite_node(&mut backward, idx);
        }

        for key in forward.keys() {
            assert_eq!(forward.uses_keys(&key), backward.uses_keys(&key));
            assert_eq!(forward.used_by_keys(&key), backward.used_by_keys(&key));
        }
    }

    #[test]
    fn test_custom_certificate_data_type() {
        let mut graph = graph_of(TREE);
        let certs = certs();
        let config = RewriteConfig {
            certificate_data_type: "google_compute_region_ssl_certificate".to_string(),
        };
        Rewriter::new(&certs, &config).rewrite_all(&mut graph);

        assert_eq!(
            attribute_expr(&graph, "google_compute_target_https_proxy_proxy", SSL_CERTIFICATES),
            expr_of("[data.google_compute_region_ssl_certificate.frontend.self_link]")
        );
    }

    #[test]
    fn test_rewritten_references_serialize_as_traversals() {
        let mut graph = graph_of(
            r#"
resource "t" "bar" {}

resource "u" "src" {
  x = "${data.foo.outputs.t_bar_self_links}"
  y = ["${data.foo.outputs.t_bar_self_links}"]
  z = data.foo.outputs.t_bar_self_links
}
"#,
        );
        let certs = certs();
        let rewriter = Rewriter::new(&certs, &RewriteConfig::default());
        rewriter.rewrite_all(&mut graph);
        let second = rewriter.rewrite_all(&mut graph);

        assert_eq!(second.references, 0);
        assert_eq!(graph.uses_keys("u_src"), vec!["t_bar"]);
        assert_eq!(graph.used_by_keys("t_bar"), vec!["u_src"]);

        let text = hcl::to_string(&graph.get("u_src").unwrap().block).unwrap();
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(text.contains("x = t.bar.self_link"), "{}", text);
        assert!(text.contains("y = t.bar.self_link"), "{}", text);
        assert!(text.contains("z = t.bar.self_link"), "{}", text);
        assert!(!text.contains("outputs"), "{}", text);
    }
}
