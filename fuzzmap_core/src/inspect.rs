//! The info panel shown for a selected block.

use crate::distance::Distance;
use crate::graph::{Graph, GraphNode};
use crate::node_id::NodeId;
use serde::Serialize;
use std::fmt;

/// A neighboring block as listed in the info panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NeighborEntry {
    pub id: NodeId,
    pub distance: Distance,
    /// Set when stepping to this neighbor gets closer to a target.
    pub closer_to_target: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeReport {
    pub id: NodeId,
    pub function: String,
    pub frequency: u64,
    pub belonging_targets: Vec<String>,
    pub rank: String,
    pub lines: String,
    pub block_name: String,
    pub distance: Distance,
    pub target_label: Option<String>,
    pub predecessors: Vec<NeighborEntry>,
    pub successors: Vec<NeighborEntry>,
}

/// Builds the info panel for the block named `raw`, in either id form.
pub fn inspect(graph: &Graph, raw: &str) -> Option<NodeReport> {
    let node = graph.find(raw)?;
    let reference = node.distance_from_target;

    Some(NodeReport {
        id: node.display_id.clone(),
        function: node.function.clone(),
        frequency: node.frequency,
        belonging_targets: node.belonging_targets.clone(),
        rank: node.rank.to_string(),
        lines: format!("{}-{}", node.line_range.0, node.line_range.1),
        block_name: node.block_name.clone(),
        distance: node.distance_from_target,
        target_label: node.target_label.clone(),
        predecessors: neighbor_entries(graph.predecessors(&node.display_id), reference),
        successors: neighbor_entries(graph.successors(&node.display_id), reference),
    })
}

fn neighbor_entries<'a>(
    neighbors: impl Iterator<Item = &'a GraphNode>,
    reference: Distance,
) -> Vec<NeighborEntry> {
    neighbors
        .map(|n| NeighborEntry {
            id: n.display_id.clone(),
            distance: n.distance_from_target,
            closer_to_target: n.distance_from_target.is_closer_than(&reference),
        })
        .collect()
}

fn write_neighbors(f: &mut fmt::Formatter<'_>, entries: &[NeighborEntry]) -> fmt::Result {
    if entries.is_empty() {
        return writeln!(f, " -");
    }
    for entry in entries {
        let marker = if entry.closer_to_target { "*" } else { "" };
        write!(f, " {}{marker}", entry.id)?;
    }
    writeln!(f)
}

impl fmt::Display for NodeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target_label {
            Some(label) => writeln!(f, "{} [target: {label}]", self.id)?,
            None => writeln!(f, "{}", self.id)?,
        }
        write!(f, "Predecessors:")?;
        write_neighbors(f, &self.predecessors)?;
        write!(f, "Successors:")?;
        write_neighbors(f, &self.successors)?;
        writeln!(f, "Function information:")?;
        writeln!(f, "  Function name: {}", self.function)?;
        writeln!(f, "  Total visit frequency: {}", self.frequency)?;
        writeln!(f, "  Belonging targets: {}", self.belonging_targets.join(","))?;
        writeln!(f, "  Rank: {}", self.rank)?;
        writeln!(f, "Basic block information:")?;
        writeln!(f, "  Line: {}", self.lines)?;
        writeln!(f, "  Name in .ll: {}", self.block_name)?;
        write!(f, "  Distance from target: {}", self.distance)
    }
}
