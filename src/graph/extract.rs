//! Subgraph Extraction
//!
//! Collects the bounded bidirectional closure of one resource: everything it
//! uses and everything that uses it, stopping at shared resources (used by
//! more than one other resource) unless the shared resource is the target.

use hcl::{Body, Structure};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

use super::{ResourceGraph, ResourceKey};
use crate::config::ExtractOrder;
use crate::error::ExtractError;

/// Resources used by more than this many others are left out of extractions
pub const FAN_OUT_THRESHOLD: usize = 1;

/// Result of extracting one resource
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Requested resource key
    pub target: ResourceKey,
    /// Included resource keys, in output order
    pub keys: Vec<ResourceKey>,
    /// Shared resources reached but left out
    pub skipped: Vec<ResourceKey>,
    /// Output document
    pub body: Body,
}

impl Extraction {
    /// Serialize the output document
    pub fn to_hcl(&self) -> Result<String, hcl::Error> {
        hcl::to_string(&self.body)
    }
}

/// Depth-first closure walk; owns its visited set for one extraction
struct ClosureWalk<'g> {
    graph: &'g ResourceGraph,
    root: NodeIndex,
    visited: HashSet<NodeIndex>,
    included: Vec<NodeIndex>,
    skipped: Vec<NodeIndex>,
}

impl<'g> ClosureWalk<'g> {
    fn new(graph: &'g ResourceGraph, root: NodeIndex) -> Self {
        let mut visited = HashSet::new();
        visited.insert(root);
        Self {
            graph,
            root,
            visited,
            included: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn visit(&mut self, idx: NodeIndex) {
        let node = self.graph.node(idx);
        let used_by = self.graph.used_by(idx);

        if used_by.len() > FAN_OUT_THRESHOLD && idx != self.root {
            tracing::debug!(kind = %node.kind, name = %node.name, users = used_by.len(), "skipping shared resource");
            self.skipped.push(idx);
            return;
        }

        for user in used_by {
            if !self.visited.insert(user) {
                continue;
            }
            tracing::debug!(kind = %node.kind, name = %node.name, user = %self.graph.node(user).key(), "adding user");
            self.visit(user);
        }

        for used in self.graph.uses(idx) {
            if !self.visited.insert(used) {
                continue;
            }
            tracing::debug!(kind = %node.kind, name = %node.name, uses = %self.graph.node(used).key(), "adding dependency");
            self.visit(used);
        }

        tracing::debug!(kind = %node.kind, name = %node.name, "added");
        self.included.push(idx);
    }
}

/// Extract the closure of `key` as an ordered document.
///
/// Fails when the key is unknown, when an included resource carries a
/// certificate that could not be resolved, or, in topological order, when the
/// included resources reference each other in a cycle.
pub fn extract(graph: &ResourceGraph, key: &str, order: ExtractOrder) -> Result<Extraction, ExtractError> {
    let root = graph
        .index_of(key)
        .ok_or_else(|| ExtractError::KeyNotFound(key.to_string()))?;

    let mut walk = ClosureWalk::new(graph, root);
    walk.visit(root);
    let ClosureWalk { included, skipped, .. } = walk;

    for &idx in &included {
        let node = graph.node(idx);
        if let Some(certificate) = node.unresolved_certificates.iter().next() {
            return Err(ExtractError::UnresolvedCertificate {
                key: node.key(),
                certificate: certificate.clone(),
            });
        }
    }

    let ordered = match order {
        ExtractOrder::Traversal => included,
        ExtractOrder::Topological => topological(graph, &included)?,
    };

    let body: Body = ordered
        .iter()
        .map(|&idx| Structure::Block(graph.node(idx).block.clone()))
        .collect();
    let keys: Vec<ResourceKey> = ordered.iter().map(|&idx| graph.node(idx).key()).collect();

    tracing::info!(resource = key, included = keys.len(), skipped = skipped.len(), "extracted");

    Ok(Extraction {
        target: graph.node(root).key(),
        keys,
        skipped: skipped.into_iter().map(|idx| graph.node(idx).key()).collect(),
        body,
    })
}

/// Reorder a node subset so every resource follows the ones it uses
fn topological(graph: &ResourceGraph, subset: &[NodeIndex]) -> Result<Vec<NodeIndex>, ExtractError> {
    let mut sub: DiGraph<NodeIndex, ()> = DiGraph::with_capacity(subset.len(), subset.len());
    let positions: HashMap<NodeIndex, NodeIndex> = subset
        .iter()
        .map(|&idx| (idx, sub.add_node(idx)))
        .collect();

    // Edges point from the used resource to its user
    for &idx in subset {
        for used in graph.uses(idx) {
            if let Some(&from) = positions.get(&used) {
                sub.add_edge(from, positions[&idx], ());
            }
        }
    }

    toposort(&sub, None)
        .map(|sorted| sorted.into_iter().map(|n| sub[n]).collect())
        .map_err(|cycle| ExtractError::Cycle(graph.node(sub[cycle.node_id()]).key()))
}
