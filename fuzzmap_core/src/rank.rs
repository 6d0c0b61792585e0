use crate::node_id::NodeId;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Position of a block when all visited blocks are ordered by descending visit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum Rank {
    /// 1-based position out of `total` ranked blocks.
    Ranked { position: usize, total: usize },
    /// The block has no entry in the replay's visit counts.
    Unranked,
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rank::Ranked { position, total } => write!(f, "{position} / {total}"),
            Rank::Unranked => f.write_str("unranked"),
        }
    }
}

/// Frequency ranking over the blocks that carry visit data.
#[derive(Debug, Clone, Default)]
pub struct RankTable {
    positions: HashMap<NodeId, usize>,
    total: usize,
}

impl RankTable {
    pub fn rank_of(&self, id: &NodeId) -> Rank {
        match self.positions.get(id) {
            Some(&position) => Rank::Ranked {
                position,
                total: self.total,
            },
            None => Rank::Unranked,
        }
    }

    /// Number of ranked blocks, the denominator shown next to each rank.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Ranks blocks by descending visit count.
///
/// Equal counts do not share a rank: the sort is stable, so ties keep the order in
/// which the blocks appear in `visit_counts`.
pub fn compute_ranks(visit_counts: &IndexMap<NodeId, u64>) -> RankTable {
    let mut entries: Vec<(&NodeId, u64)> = visit_counts.iter().map(|(id, &n)| (id, n)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));

    let positions = entries
        .into_iter()
        .enumerate()
        .map(|(index, (id, _))| (id.clone(), index + 1))
        .collect();

    RankTable {
        positions,
        total: visit_counts.len(),
    }
}
