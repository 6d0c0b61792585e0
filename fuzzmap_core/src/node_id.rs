use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the function/file part and the line part in the display form.
const DISPLAY_SEPARATOR: char = ':';
/// Separator used by the internal form.
const INTERNAL_SEPARATOR: char = '_';

/// Rewrites the func/line separator of a display id (`func:line`) into the internal
/// underscore form (`func_line`).
///
/// Only the rightmost colon is rewritten; an id without a colon is returned unchanged.
pub fn normalize(id: &str) -> String {
    replace_rightmost(id, DISPLAY_SEPARATOR, INTERNAL_SEPARATOR)
}

/// Inverse of [`normalize`]: replaces the rightmost underscore with a colon.
///
/// Function names may contain underscores themselves, so only the last one is the
/// func/line boundary. An id without an underscore is returned unchanged.
pub fn denormalize(id: &str) -> String {
    replace_rightmost(id, INTERNAL_SEPARATOR, DISPLAY_SEPARATOR)
}

fn replace_rightmost(id: &str, from: char, to: char) -> String {
    match id.rfind(from) {
        Some(index) => {
            let mut rewritten = String::with_capacity(id.len());
            rewritten.push_str(&id[..index]);
            rewritten.push(to);
            rewritten.push_str(&id[index + from.len_utf8()..]);
            rewritten
        }
        None => id.to_string(),
    }
}

/// Identifier of a basic block in the control-flow graph.
///
/// Payloads name blocks in the display form (`file.c:42`); the exported graph and its
/// links key them by the internal underscore form (`file.c_42`). A `NodeId` stores the
/// display form and derives the internal form on demand.
///
/// The mapping is not injective: `a_b:1` and `a:b_1` both become `a_b_1`, and that
/// internal id converts back to `a_b:1`. The graph builder reports such collisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates an id from its display (colon) form.
    pub fn new(display: impl Into<String>) -> Self {
        NodeId(display.into())
    }

    /// Creates an id from its internal (underscore) form.
    pub fn from_internal_form(internal: &str) -> Self {
        NodeId(denormalize(internal))
    }

    pub fn to_display_form(&self) -> &str {
        &self.0
    }

    pub fn to_internal_form(&self) -> String {
        normalize(&self.0)
    }

    /// Splits the id into its location part and line number, if the line part parses.
    pub fn location(&self) -> Option<(&str, u32)> {
        let (location, line) = self.0.rsplit_once(DISPLAY_SEPARATOR)?;
        line.parse().ok().map(|line| (location, line))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(display: &str) -> Self {
        NodeId::new(display)
    }
}

impl From<String> for NodeId {
    fn from(display: String) -> Self {
        NodeId(display)
    }
}
