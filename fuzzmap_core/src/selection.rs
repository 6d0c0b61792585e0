use crate::graph::{Graph, GraphNode};
use crate::node_id::NodeId;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Query parameter that names the block to focus on initial render.
pub const FOCUS_QUERY_KEY: &str = "k";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectionError {
    #[error("No block named {0:?} in the graph")]
    UnknownNode(String),
}

/// Where the view should settle after the initial render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "node")]
pub enum Focus {
    Node(NodeId),
    /// No usable selector: show the default centered view.
    Centered,
}

/// Owns the "currently selected block" of an interactive session.
///
/// The presentation layer routes every click, search pick and focus request through
/// one controller instead of mutating shared state.
#[derive(Debug, Default, Clone)]
pub struct SelectionController {
    selected: Option<NodeId>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self { selected: None }
    }

    pub fn selected(&self) -> Option<&NodeId> {
        self.selected.as_ref()
    }

    /// Selects a block named in either id form and returns it.
    pub fn select<'g>(&mut self, graph: &'g Graph, raw: &str) -> Result<&'g GraphNode, SelectionError> {
        let node = graph
            .find(raw)
            .ok_or_else(|| SelectionError::UnknownNode(raw.to_string()))?;
        debug!(node = %node.display_id, "Selected block");
        self.selected = Some(node.display_id.clone());
        Ok(node)
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    pub fn is_selected(&self, id: &NodeId) -> bool {
        self.selected.as_ref() == Some(id)
    }

    /// Resolves the focus selector from a URL query string such as `?k=parser.c%3A120`.
    ///
    /// A resolvable block becomes the selection; an absent or unknown value leaves the
    /// selection untouched and falls back to the centered view.
    pub fn focus_from_query(&mut self, graph: &Graph, query: &str) -> Focus {
        let query = query.trim_start_matches('?');
        let requested = url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == FOCUS_QUERY_KEY)
            .map(|(_, value)| value.into_owned());

        match requested {
            Some(raw) => self.focus_on(graph, &raw),
            None => Focus::Centered,
        }
    }

    /// Focuses a block named directly, with the same fallback as [`Self::focus_from_query`].
    pub fn focus_on(&mut self, graph: &Graph, raw: &str) -> Focus {
        match self.select(graph, raw) {
            Ok(node) => Focus::Node(node.display_id.clone()),
            Err(e) => {
                debug!("{e}, falling back to centered view");
                Focus::Centered
            }
        }
    }
}
