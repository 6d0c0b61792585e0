use crate::builder::BuildWarning;
use crate::distance::Distance;
use crate::node_id::NodeId;
use crate::rank::Rank;
use indexmap::IndexSet;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// A basic block with its static facts, campaign statistics and adjacency.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Internal (underscore) form of the id, used as the link key by the front-end.
    pub id: String,
    pub display_id: NodeId,
    pub function: String,
    pub line_range: (u32, u32),
    pub block_name: String,
    /// Serialized in the internal form, like `id`.
    #[serde(serialize_with = "internal_ids")]
    pub successors: IndexSet<NodeId>,
    #[serde(serialize_with = "internal_ids")]
    pub predecessors: IndexSet<NodeId>,
    pub frequency: u64,
    pub rank: Rank,
    pub belonging_targets: Vec<String>,
    pub target_label: Option<String>,
    pub distance_from_target: Distance,
}

impl GraphNode {
    pub fn is_target(&self) -> bool {
        self.target_label.is_some()
    }
}

fn internal_ids<S: Serializer>(ids: &IndexSet<NodeId>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(ids.iter().map(NodeId::to_internal_form))
}

/// A directed control-flow edge between two known blocks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
}

/// The unified block graph.
///
/// Nodes are stored in topology order and indexed by id, so lookups by either
/// id form are O(1).
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub(crate) nodes: Vec<GraphNode>,
    pub(crate) index: HashMap<NodeId, usize>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) warnings: Vec<BuildWarning>,
}

impl Graph {
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Data-quality problems recovered from while building the graph.
    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Looks a block up by an id written in either the display or the internal form.
    pub fn find(&self, raw: &str) -> Option<&GraphNode> {
        self.node(&NodeId::new(raw))
            .or_else(|| self.node(&NodeId::from_internal_form(raw)))
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }

    pub fn rank_of(&self, id: &NodeId) -> Option<Rank> {
        self.node(id).map(|n| n.rank)
    }

    pub fn distance_of(&self, id: &NodeId) -> Option<Distance> {
        self.node(id).map(|n| n.distance_from_target)
    }

    pub fn successors(&self, id: &NodeId) -> impl Iterator<Item = &GraphNode> {
        self.neighbors(id, |n| &n.successors)
    }

    pub fn predecessors(&self, id: &NodeId) -> impl Iterator<Item = &GraphNode> {
        self.neighbors(id, |n| &n.predecessors)
    }

    pub fn targets(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.is_target())
    }

    fn neighbors<'a>(
        &'a self,
        id: &NodeId,
        side: fn(&GraphNode) -> &IndexSet<NodeId>,
    ) -> impl Iterator<Item = &'a GraphNode> + 'a {
        self.node(id)
            .map(side)
            .into_iter()
            .flatten()
            .filter_map(move |neighbor| self.node(neighbor))
    }
}
