//! Resource Dependency Graph
//!
//! Primary data structure using petgraph for resource-to-resource references.
//! Nodes live in an arena indexed by `NodeIndex`; a `HashMap` maps resource
//! keys to indices. An edge `a -> b` means "a uses b", so `uses` is the
//! outgoing neighbor set and `used_by` the incoming one. Cycles are allowed.
//!
//! Shared between:
//! - Reference rewriting (adds edges, mutates attribute expressions)
//! - Subgraph extraction (read-only traversal)

pub mod loader;
pub mod rewrite;
pub mod extract;

pub use extract::{extract, Extraction};
pub use loader::load_from_directory;
pub use rewrite::{RewriteSummary, Rewriter};

use hcl::{Block, BlockLabel, Body};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};

/// Resource key: `<kind>_<name>`
pub type ResourceKey = String;

/// Block identifier of resource declarations
pub const RESOURCE_BLOCK: &str = "resource";

/// Why an edge exists: the attribute on the user that now references the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub attribute: String,
}

/// One declared resource
#[derive(Debug, Clone)]
pub struct ResourceNode {
    /// Resource type, e.g. `google_compute_network`
    pub kind: String,
    /// Local name as declared
    pub name: String,
    /// Local name with `-` replaced by `_`, also written into the block
    pub label: String,
    /// The resource block, owned by this node
    pub block: Block,
    /// Certificate names the rewriter could not resolve
    pub unresolved_certificates: BTreeSet<String>,
}

impl ResourceNode {
    /// Build a node from a `resource "<kind>" "<name>"` block, normalizing its
    /// name label. Returns `None` for any other block shape.
    pub fn from_block(mut block: Block) -> Option<Self> {
        if block.identifier() != RESOURCE_BLOCK || block.labels.len() != 2 {
            return None;
        }

        let kind = block.labels[0].as_str().to_string();
        let name = block.labels[1].as_str().to_string();
        let label = normalize_label(&name);
        block.labels[1] = BlockLabel::String(label.clone());

        Some(Self {
            kind,
            name,
            label,
            block,
            unresolved_certificates: BTreeSet::new(),
        })
    }

    /// Resource key (`kind_name`)
    pub fn key(&self) -> ResourceKey {
        resource_key(&self.kind, &self.name)
    }

    /// Token used in traversal visited sets
    pub fn output_form(&self) -> String {
        self.key()
    }

    /// Direct reference prefix (`kind.label`)
    pub fn reference_form(&self) -> String {
        format!("{}.{}", self.kind, self.label)
    }

    /// `self_link` attribute reference of this resource
    pub fn self_link(&self) -> String {
        format!("{}.self_link", self.reference_form())
    }
}

/// Build a resource key from its type and local name
pub fn resource_key(kind: &str, name: &str) -> ResourceKey {
    format!("{}_{}", kind, name)
}

/// Make a local name usable as a bare identifier in references
pub fn normalize_label(name: &str) -> String {
    name.replace('-', "_")
}

/// The resource dependency graph
#[derive(Debug, Default)]
pub struct ResourceGraph {
    /// Arena of nodes; edges point from user to used
    pub(crate) graph: DiGraph<ResourceNode, Reference>,

    /// Node index lookup: resource key -> NodeIndex
    pub(crate) node_indices: HashMap<ResourceKey, NodeIndex>,

    /// Index: normalized key (dashes as underscores) -> NodeIndex
    pub(crate) by_normalized: HashMap<ResourceKey, NodeIndex>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from already parsed bodies. Each body is paired with its
    /// override flag and registered in order.
    pub fn from_bodies<I>(bodies: I) -> Self
    where
        I: IntoIterator<Item = (Body, bool)>,
    {
        let mut graph = Self::new();
        for (body, override_existing) in bodies {
            graph.register_body(body, override_existing);
        }
        graph
    }

    /// Register every resource block of a body. Returns how many were kept.
    pub fn register_body(&mut self, body: Body, override_existing: bool) -> usize {
        let mut kept = 0;
        for block in body.into_blocks() {
            if self.register(block, override_existing).is_some() {
                kept += 1;
            }
        }
        kept
    }

    /// Register one block under the override rule.
    ///
    /// Non-resource blocks are ignored. An existing key is only replaced when
    /// `override_existing` is set; the replacement reuses the arena slot.
    pub fn register(&mut self, block: Block, override_existing: bool) -> Option<NodeIndex> {
        let node = ResourceNode::from_block(block)?;
        let key = node.key();

        if let Some(&idx) = self.node_indices.get(&key) {
            if !override_existing {
                tracing::trace!(%key, "keeping existing declaration");
                return None;
            }
            tracing::debug!(%key, "overriding with global declaration");
            self.graph[idx] = node;
            return Some(idx);
        }

        let normalized = resource_key(&node.kind, &node.label);
        let idx = self.graph.add_node(node);
        self.node_indices.insert(key, idx);
        self.by_normalized.entry(normalized).or_insert(idx);
        Some(idx)
    }

    // ========== Public API ==========

    /// Get node count
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get edge count
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether a resource key is declared
    pub fn contains(&self, key: &str) -> bool {
        self.node_indices.contains_key(key)
    }

    /// Resolve a key to its index, accepting the normalized form too
    pub fn index_of(&self, key: &str) -> Option<NodeIndex> {
        self.node_indices
            .get(key)
            .or_else(|| self.by_normalized.get(key))
            .copied()
    }

    /// Get node by key
    pub fn get(&self, key: &str) -> Option<&ResourceNode> {
        self.index_of(key).map(|idx| &self.graph[idx])
    }

    pub fn node(&self, idx: NodeIndex) -> &ResourceNode {
        &self.graph[idx]
    }

    /// Record that `user` references `used`. Idempotent.
    pub fn add_reference(&mut self, user: NodeIndex, used: NodeIndex, attribute: &str) {
        if self.graph.find_edge(user, used).is_some() {
            return;
        }
        self.graph.add_edge(
            user,
            used,
            Reference {
                attribute: attribute.to_string(),
            },
        );
    }

    /// Nodes this node references, sorted by key
    pub fn uses(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors_sorted(idx, Direction::Outgoing)
    }

    /// Nodes referencing this node, sorted by key
    pub fn used_by(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors_sorted(idx, Direction::Incoming)
    }

    /// Keys this resource references
    pub fn uses_keys(&self, key: &str) -> Vec<ResourceKey> {
        self.index_of(key)
            .map(|idx| self.uses(idx).into_iter().map(|n| self.graph[n].key()).collect())
            .unwrap_or_default()
    }

    /// Keys of resources referencing this resource
    pub fn used_by_keys(&self, key: &str) -> Vec<ResourceKey> {
        self.index_of(key)
            .map(|idx| self.used_by(idx).into_iter().map(|n| self.graph[n].key()).collect())
            .unwrap_or_default()
    }

    /// All node indices in key order
    pub fn indices(&self) -> Vec<NodeIndex> {
        let mut indices: Vec<NodeIndex> = self.graph.node_indices().collect();
        indices.sort_by_key(|idx| self.graph[*idx].key());
        indices
    }

    /// All resource keys, sorted
    pub fn keys(&self) -> Vec<ResourceKey> {
        let mut keys: Vec<ResourceKey> = self.node_indices.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Declared local names of every resource of a kind, sorted
    pub fn names_of_kind(&self, kind: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .graph
            .node_weights()
            .filter(|node| node.kind == kind)
            .map(|node| node.name.clone())
            .collect();
        names.sort();
        names
    }

    fn neighbors_sorted(&self, idx: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> = self
            .graph
            .edges_directed(idx, direction)
            .map(|edge| match direction {
                Direction::Outgoing => edge.target(),
                Direction::Incoming => edge.source(),
            })
            .collect();
        neighbors.sort_by_key(|n| self.graph[*n].key());
        neighbors.dedup();
        neighbors
    }
}
