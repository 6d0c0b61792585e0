//! Forward hop distance from every block to the nearest target block.

use crate::node_id::NodeId;
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

/// Number of forward control-flow edges between a block and the closest target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Distance {
    Hops(usize),
    /// No chain of successor edges leads from the block to any target.
    Unreachable,
}

impl Distance {
    pub fn hops(&self) -> Option<usize> {
        match self {
            Distance::Hops(n) => Some(*n),
            Distance::Unreachable => None,
        }
    }

    /// True when both distances are finite and `self` is strictly smaller.
    pub fn is_closer_than(&self, other: &Distance) -> bool {
        match (self, other) {
            (Distance::Hops(a), Distance::Hops(b)) => a < b,
            _ => false,
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::Hops(n) => write!(f, "{n}"),
            Distance::Unreachable => f.write_str("unreachable"),
        }
    }
}

impl Serialize for Distance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Distance::Hops(n) => serializer.serialize_u64(*n as u64),
            Distance::Unreachable => serializer.serialize_str("unreachable"),
        }
    }
}

/// Computes the minimum forward hop count from each block to any block in `targets`.
///
/// `adjacency` yields every block with its successor set. The search starts from all
/// targets at distance 0 and walks predecessor links, built here as a reverse index so
/// the whole pass is linear in blocks plus edges. Blocks that cannot reach a target are
/// absent from the result; an empty target set therefore yields an empty map.
pub fn compute_distances<'a, A, S>(adjacency: A, targets: &HashSet<NodeId>) -> HashMap<NodeId, usize>
where
    A: IntoIterator<Item = (&'a NodeId, S)>,
    S: IntoIterator<Item = &'a NodeId>,
{
    let mut reverse: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
    for (node, successors) in adjacency {
        for successor in successors {
            reverse.entry(successor).or_default().push(node);
        }
    }

    let mut distances: HashMap<NodeId, usize> = HashMap::with_capacity(reverse.len());
    let mut queue: VecDeque<(&NodeId, usize)> = VecDeque::new();
    for target in targets {
        distances.insert(target.clone(), 0);
        queue.push_back((target, 0));
    }

    while let Some((current, depth)) = queue.pop_front() {
        let Some(predecessors) = reverse.get(current) else {
            continue;
        };
        for &predecessor in predecessors {
            if !distances.contains_key(predecessor) {
                distances.insert(predecessor.clone(), depth + 1);
                queue.push_back((predecessor, depth + 1));
            }
        }
    }

    distances
}
