use crate::distance::{Distance, compute_distances};
use crate::graph::{Edge, Graph, GraphNode};
use crate::node_id::NodeId;
use crate::payload::{BlockMetadata, RawTopology, ReplayData, StaticMetadata};
use crate::rank::{RankTable, compute_ranks};
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Data-quality problems the builder recovers from.
///
/// None of these abort a build: each is logged as it happens and collected on the
/// resulting [`Graph`] so callers can report them alongside the (possibly degraded) graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildWarning {
    /// A topology block has no static metadata; it is kept with empty fields.
    #[error("No metadata for block {0}, using placeholder fields")]
    MissingMetadata(NodeId),

    /// An edge names a block outside the topology; the edge is dropped.
    #[error("Dropped edge {from} -> {to}: unknown endpoint {missing}")]
    UnknownEdgeEndpoint {
        from: NodeId,
        to: NodeId,
        missing: NodeId,
    },

    /// The topology lists the same block more than once; only the first is kept.
    #[error("Block {0} listed more than once in the topology")]
    DuplicateNode(NodeId),

    /// A replay target is not a topology block; it cannot seed distances.
    #[error("Target {0} is not a block of the topology")]
    UnknownTarget(NodeId),

    /// Two distinct blocks map to the same internal id. Both are kept, but lookups and
    /// front-end links by that internal id resolve to `first`.
    #[error("Blocks {first} and {second} share the internal id {internal}")]
    InternalIdCollision {
        first: NodeId,
        second: NodeId,
        internal: String,
    },
}

/// Merges topology, replay statistics and static metadata into a [`Graph`].
pub struct GraphBuilder<'a> {
    topology: &'a RawTopology,
    replay: &'a ReplayData,
    metadata: &'a StaticMetadata,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        topology: &'a RawTopology,
        replay: &'a ReplayData,
        metadata: &'a StaticMetadata,
    ) -> Self {
        Self {
            topology,
            replay,
            metadata,
        }
    }

    /// Builds the graph, then backfills every block's distance to the nearest target.
    pub fn build(&self) -> Graph {
        let ranks = compute_ranks(&self.replay.visit_counts);
        let mut graph = Graph::default();
        let mut internal_ids: HashMap<String, NodeId> = HashMap::new();

        for id in &self.topology.nodes {
            if graph.index.contains_key(id) {
                record(&mut graph, BuildWarning::DuplicateNode(id.clone()));
                continue;
            }
            let internal = id.to_internal_form();
            if let Some(first) = internal_ids.get(&internal) {
                let warning = BuildWarning::InternalIdCollision {
                    first: first.clone(),
                    second: id.clone(),
                    internal,
                };
                record(&mut graph, warning);
            } else {
                internal_ids.insert(internal, id.clone());
            }
            let node = self.make_node(id, &ranks, &mut graph.warnings);
            graph.index.insert(id.clone(), graph.nodes.len());
            graph.nodes.push(node);
        }

        self.link_edges(&mut graph);
        let targets = self.resolve_targets(&mut graph);
        backfill_distances(&mut graph, &targets);

        info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            targets = targets.len(),
            ranked = ranks.total(),
            warnings = graph.warnings.len(),
            "Built block graph"
        );
        graph
    }

    fn make_node(
        &self,
        id: &NodeId,
        ranks: &RankTable,
        warnings: &mut Vec<BuildWarning>,
    ) -> GraphNode {
        let metadata = match self.metadata.get(id) {
            Some(found) => found.clone(),
            None => {
                let warning = BuildWarning::MissingMetadata(id.clone());
                warn!("{warning}");
                warnings.push(warning);
                BlockMetadata::default()
            }
        };

        GraphNode {
            id: id.to_internal_form(),
            display_id: id.clone(),
            function: metadata.function,
            line_range: (metadata.start_line, metadata.end_line),
            block_name: metadata.block_name,
            successors: IndexSet::new(),
            predecessors: IndexSet::new(),
            frequency: self.replay.visit_counts.get(id).copied().unwrap_or(0),
            rank: ranks.rank_of(id),
            belonging_targets: metadata.belonging_targets,
            target_label: self.replay.targets.get(id).cloned(),
            distance_from_target: Distance::Unreachable,
        }
    }

    fn link_edges(&self, graph: &mut Graph) {
        let mut seen: HashSet<(&NodeId, &NodeId)> = HashSet::new();

        for (source, target) in &self.topology.edges {
            let endpoints = (graph.index.get(source), graph.index.get(target));
            let (Some(&from), Some(&to)) = endpoints else {
                let missing = if endpoints.0.is_none() { source } else { target };
                record(
                    graph,
                    BuildWarning::UnknownEdgeEndpoint {
                        from: source.clone(),
                        to: target.clone(),
                        missing: missing.clone(),
                    },
                );
                continue;
            };

            if !seen.insert((source, target)) {
                debug!("Skipping repeated edge {source} -> {target}");
                continue;
            }

            graph.nodes[from].successors.insert(target.clone());
            graph.nodes[to].predecessors.insert(source.clone());
            graph.edges.push(Edge {
                source: source.clone(),
                target: target.clone(),
            });
        }
    }

    fn resolve_targets(&self, graph: &mut Graph) -> HashSet<NodeId> {
        let mut targets = HashSet::new();
        for id in self.replay.targets.keys() {
            if graph.index.contains_key(id) {
                targets.insert(id.clone());
            } else {
                record(graph, BuildWarning::UnknownTarget(id.clone()));
            }
        }
        if targets.is_empty() {
            info!("No targets in the replay data, every block is unreachable");
        }
        targets
    }
}

fn record(graph: &mut Graph, warning: BuildWarning) {
    warn!("{warning}");
    graph.warnings.push(warning);
}

fn backfill_distances(graph: &mut Graph, targets: &HashSet<NodeId>) {
    let distances: HashMap<NodeId, usize> = compute_distances(
        graph.nodes.iter().map(|n| (&n.display_id, n.successors.iter())),
        targets,
    );
    for node in &mut graph.nodes {
        node.distance_from_target = match distances.get(&node.display_id) {
            Some(&hops) => Distance::Hops(hops),
            None => Distance::Unreachable,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::Rank;
    use serde_json::json;

    fn topology(value: serde_json::Value) -> RawTopology {
        serde_json::from_value(value).unwrap()
    }

    fn replay(value: serde_json::Value) -> ReplayData {
        serde_json::from_value(value).unwrap()
    }

    fn metadata(value: serde_json::Value) -> StaticMetadata {
        serde_json::from_value(value).unwrap()
    }

    fn chain_metadata() -> StaticMetadata {
        metadata(json!({
            "f:1": {"func": "f", "start": 1, "end": 1, "bb": "entry", "belonging targets": ["bug1"]},
            "f:2": {"func": "f", "start": 2, "end": 2, "bb": "if.then", "belonging targets": ["bug1"]},
            "f:3": {"func": "f", "start": 3, "end": 4, "bb": "if.end", "belonging targets": ["bug1"]}
        }))
    }

    fn chain_topology() -> RawTopology {
        topology(json!({
            "nodes": ["f:1", "f:2", "f:3"],
            "edges": [["f:1", "f:2"], ["f:2", "f:3"]]
        }))
    }

    #[test]
    fn chain_scenario_distances() {
        let graph = GraphBuilder::new(
            &chain_topology(),
            &replay(json!({"visit": {}, "targets": {"f:3": "bug1"}})),
            &chain_metadata(),
        )
        .build();

        assert_eq!(graph.distance_of(&NodeId::new("f:3")), Some(Distance::Hops(0)));
        assert_eq!(graph.distance_of(&NodeId::new("f:2")), Some(Distance::Hops(1)));
        assert_eq!(graph.distance_of(&NodeId::new("f:1")), Some(Distance::Hops(2)));
        assert!(graph.warnings().is_empty(), "Clean inputs must not warn: {:?}", graph.warnings());
    }

    #[test]
    fn rank_scenario_with_denominator() {
        let graph = GraphBuilder::new(
            &chain_topology(),
            &replay(json!({"visit": {"f:1": 10, "f:2": 10, "f:3": 5}})),
            &chain_metadata(),
        )
        .build();

        let ranks: Vec<Rank> = graph.nodes().iter().map(|n| n.rank).collect();
        assert_eq!(
            ranks,
            vec![
                Rank::Ranked { position: 1, total: 3 },
                Rank::Ranked { position: 2, total: 3 },
                Rank::Ranked { position: 3, total: 3 },
            ]
        );
        let freqs: Vec<u64> = graph.nodes().iter().map(|n| n.frequency).collect();
        assert_eq!(freqs, vec![10, 10, 5]);
    }

    #[test]
    fn unknown_edge_endpoint_is_dropped_with_warning() {
        let topo = topology(json!({
            "nodes": ["f:1", "f:2", "f:3"],
            "edges": [["f:1", "f:2"], ["f:2", "f:9"], ["f:2", "f:3"]]
        }));
        let graph = GraphBuilder::new(&topo, &ReplayData::default(), &chain_metadata()).build();

        assert_eq!(graph.len(), 3, "Dropping an edge must not change the node count");
        assert_eq!(graph.edges().len(), 2);
        assert_eq!(
            graph.warnings(),
            &[BuildWarning::UnknownEdgeEndpoint {
                from: NodeId::new("f:2"),
                to: NodeId::new("f:9"),
                missing: NodeId::new("f:9"),
            }]
        );
        let f2 = graph.node(&NodeId::new("f:2")).unwrap();
        assert!(!f2.successors.contains(&NodeId::new("f:9")));
    }

    #[test]
    fn unknown_source_endpoint_is_reported_as_missing() {
        let topo = topology(json!({"nodes": ["f:1"], "edges": [["g:4", "f:1"]]}));
        let graph = GraphBuilder::new(&topo, &ReplayData::default(), &chain_metadata()).build();
        assert!(graph.warnings().contains(&BuildWarning::UnknownEdgeEndpoint {
            from: NodeId::new("g:4"),
            to: NodeId::new("f:1"),
            missing: NodeId::new("g:4"),
        }));
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn empty_targets_leave_everything_unreachable() {
        let graph =
            GraphBuilder::new(&chain_topology(), &ReplayData::default(), &chain_metadata()).build();
        assert!(
            graph
                .nodes()
                .iter()
                .all(|n| n.distance_from_target == Distance::Unreachable)
        );
        assert!(graph.warnings().is_empty(), "An empty target set is not a warning");
    }

    #[test]
    fn surviving_edges_are_mirrored_in_adjacency() {
        let topo = topology(json!({
            "nodes": ["a:1", "a:2", "a:3", "a:4"],
            "edges": [["a:1", "a:2"], ["a:2", "a:3"], ["a:3", "a:1"], ["a:1", "a:4"], ["a:4", "a:5"]]
        }));
        let graph = GraphBuilder::new(&topo, &ReplayData::default(), &StaticMetadata::new()).build();

        assert!(graph.edges().len() <= topo.edges.len());
        for edge in graph.edges() {
            let source = graph.node(&edge.source).unwrap();
            let target = graph.node(&edge.target).unwrap();
            assert!(source.successors.contains(&edge.target));
            assert!(target.predecessors.contains(&edge.source));
        }
    }

    #[test]
    fn missing_metadata_yields_placeholder_node() {
        let topo = topology(json!({"nodes": ["f:1", "x.c:40"], "edges": []}));
        let graph = GraphBuilder::new(&topo, &ReplayData::default(), &chain_metadata()).build();

        assert_eq!(graph.len(), 2);
        let placeholder = graph.node(&NodeId::new("x.c:40")).unwrap();
        assert_eq!(placeholder.function, "");
        assert_eq!(placeholder.line_range, (0, 0));
        assert!(placeholder.belonging_targets.is_empty());
        assert_eq!(placeholder.id, "x.c_40");
        assert_eq!(
            graph.warnings(),
            &[BuildWarning::MissingMetadata(NodeId::new("x.c:40"))]
        );
    }

    #[test]
    fn node_fields_merge_all_three_sources() {
        let graph = GraphBuilder::new(
            &chain_topology(),
            &replay(json!({"visit": {"f:3": 42}, "targets": {"f:3": "bug1"}})),
            &chain_metadata(),
        )
        .build();
        let f3 = graph.node(&NodeId::new("f:3")).unwrap();
        assert_eq!(f3.function, "f");
        assert_eq!(f3.line_range, (3, 4));
        assert_eq!(f3.block_name, "if.end");
        assert_eq!(f3.frequency, 42);
        assert_eq!(f3.rank, Rank::Ranked { position: 1, total: 1 });
        assert_eq!(f3.target_label.as_deref(), Some("bug1"));
        assert_eq!(f3.belonging_targets, vec!["bug1".to_string()]);

        let f1 = graph.node(&NodeId::new("f:1")).unwrap();
        assert_eq!(f1.frequency, 0, "Absent visit counts default to zero");
        assert_eq!(f1.rank, Rank::Unranked);
        assert!(!f1.is_target());
    }

    #[test]
    fn duplicate_nodes_and_edges_are_collapsed() {
        let topo = topology(json!({
            "nodes": ["f:1", "f:2", "f:1"],
            "edges": [["f:1", "f:2"], ["f:1", "f:2"]]
        }));
        let graph = GraphBuilder::new(&topo, &ReplayData::default(), &StaticMetadata::new()).build();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.edges().len(), 1);
        assert!(
            graph
                .warnings()
                .contains(&BuildWarning::DuplicateNode(NodeId::new("f:1")))
        );
    }

    #[test]
    fn colliding_internal_ids_are_reported() {
        let graph = GraphBuilder::new(
            &topology(json!({"nodes": ["a_b:1", "a:b_1"], "edges": [["a_b:1", "a:b_1"]]})),
            &ReplayData::default(),
            &metadata(json!({
                "a_b:1": {"func": "a_b", "start": 1, "end": 1, "bb": "entry"},
                "a:b_1": {"func": "a", "start": 1, "end": 1, "bb": "entry"}
            })),
        )
        .build();

        assert_eq!(graph.len(), 2, "Both blocks are kept");
        assert_eq!(graph.edges().len(), 1);
        assert_eq!(
            graph.warnings(),
            &[BuildWarning::InternalIdCollision {
                first: NodeId::new("a_b:1"),
                second: NodeId::new("a:b_1"),
                internal: "a_b_1".to_string(),
            }]
        );
    }

    #[test]
    fn targets_outside_the_topology_are_reported() {
        let graph = GraphBuilder::new(
            &chain_topology(),
            &replay(json!({"targets": {"f:3": "bug1", "g:7": "bug2"}})),
            &chain_metadata(),
        )
        .build();
        assert_eq!(
            graph.warnings(),
            &[BuildWarning::UnknownTarget(NodeId::new("g:7"))]
        );
        assert_eq!(graph.distance_of(&NodeId::new("f:1")), Some(Distance::Hops(2)));
    }

    #[test]
    fn every_target_sits_at_distance_zero() {
        let topo = topology(json!({
            "nodes": ["t:1", "t:2", "n:1"],
            "edges": [["t:1", "t:2"], ["n:1", "t:1"]]
        }));
        let graph = GraphBuilder::new(
            &topo,
            &replay(json!({"targets": {"t:1": "a", "t:2": "b"}})),
            &StaticMetadata::new(),
        )
        .build();
        for target in graph.targets() {
            assert_eq!(target.distance_from_target, Distance::Hops(0));
        }
        assert_eq!(graph.distance_of(&NodeId::new("n:1")), Some(Distance::Hops(1)));
    }
}
