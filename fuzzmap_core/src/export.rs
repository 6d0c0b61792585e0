//! The JSON document handed to the force-layout front-end.

use crate::graph::{Graph, GraphNode};
use crate::loader::SourceDigests;
use crate::node_id::NodeId;
use crate::selection::Focus;
use serde::Serialize;

/// A link keyed by the internal id form, matching [`GraphNode::id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphDocument<'g> {
    pub nodes: &'g [GraphNode],
    pub links: Vec<Link>,
    pub focus: Option<NodeId>,
    pub warnings: Vec<String>,
    pub sources: SourceDigests,
}

impl<'g> GraphDocument<'g> {
    pub fn new(graph: &'g Graph, focus: &Focus, sources: SourceDigests) -> Self {
        let links = graph
            .edges()
            .iter()
            .map(|edge| Link {
                source: edge.source.to_internal_form(),
                target: edge.target.to_internal_form(),
            })
            .collect();
        let focus = match focus {
            Focus::Node(id) => Some(id.clone()),
            Focus::Centered => None,
        };

        Self {
            nodes: graph.nodes(),
            links,
            focus,
            warnings: graph.warnings().iter().map(ToString::to_string).collect(),
            sources,
        }
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}
