//! Wire shapes of the three campaign payloads.
//!
//! All mappings are [`IndexMap`]s: rank tie-breaking depends on the order in which
//! visit counts appear in the replay payload, so that order has to survive parsing.

use crate::node_id::NodeId;
use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Control-flow graph of the program as emitted by the static analyzer.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RawTopology {
    #[serde(default)]
    pub nodes: Vec<NodeId>,
    #[serde(default)]
    pub edges: Vec<(NodeId, NodeId)>,
}

/// Topology payload: `{ "dugraph": { "nodes": [...], "edges": [[a, b], ...] } }`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TopologyPayload {
    pub dugraph: RawTopology,
}

/// Replay payload: per-block visit counts and the designated targets.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ReplayData {
    #[serde(rename = "visit", default)]
    pub visit_counts: IndexMap<NodeId, u64>,
    /// Target block -> display label (usually a bug or CVE id).
    #[serde(default)]
    pub targets: IndexMap<NodeId, String>,
}

/// Static facts about a single basic block.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BlockMetadata {
    #[serde(rename = "func")]
    pub function: String,
    #[serde(rename = "start", deserialize_with = "line_number")]
    pub start_line: u32,
    #[serde(rename = "end", deserialize_with = "line_number")]
    pub end_line: u32,
    #[serde(rename = "bb")]
    pub block_name: String,
    #[serde(rename = "belonging targets", default)]
    pub belonging_targets: Vec<String>,
}

impl BlockMetadata {
    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

/// Metadata payload: block id -> static facts.
pub type StaticMetadata = IndexMap<NodeId, BlockMetadata>;

/// Accepts a line number written either as a JSON integer or as a decimal string.
fn line_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    struct LineNumberVisitor;

    impl de::Visitor<'_> for LineNumberVisitor {
        type Value = u32;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a line number as an integer or a decimal string")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<u32, E> {
            u32::try_from(value).map_err(|_| E::custom(format!("line number {value} out of range")))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<u32, E> {
            u32::try_from(value).map_err(|_| E::custom(format!("line number {value} out of range")))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<u32, E> {
            value
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid line number {value:?}")))
        }
    }

    deserializer.deserialize_any(LineNumberVisitor)
}
