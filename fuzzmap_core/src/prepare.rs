//! Turns compiler build logs and per-target analyzer graphs into the metadata and
//! topology payloads the graph builder consumes.

use crate::node_id::NodeId;
use crate::payload::{BlockMetadata, RawTopology, StaticMetadata, TopologyPayload};
use indexmap::IndexSet;
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Prefix the instrumenting compiler puts in front of every block description.
pub const BLOCK_LOG_MARKER: &str = "[FUNC|BLOCK|LINES]";
/// Analyzer output file name, one per target directory.
pub const TARGET_GRAPH_FILE: &str = "dug.json";
pub const METADATA_FILE: &str = "additional.json";

#[derive(Error, Debug)]
pub enum PrepareError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read block log: {0}")]
    Log(#[from] std::io::Error),

    #[error("Invalid graph in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to serialize {0} payload: {1}")]
    Serialize(&'static str, serde_json::Error),

    #[error("Failed to walk target directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Block metadata recovered from a build log.
#[derive(Debug, Clone, Default)]
pub struct BlockLog {
    pub metadata: StaticMetadata,
    /// Marker lines whose description could not be parsed.
    pub malformed: usize,
}

/// Parses `func|bb|file:start-end` descriptions following each block-log marker.
///
/// Blocks are keyed `file:start`; a later description with the same key replaces the
/// earlier one.
pub fn parse_block_log(reader: impl BufRead) -> Result<BlockLog, PrepareError> {
    let mut log = BlockLog::default();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let Some((_, description)) = line.split_once(BLOCK_LOG_MARKER) else {
            continue;
        };
        match parse_block_description(description) {
            Some((id, block)) => {
                log.metadata.insert(id, block);
            }
            None => {
                warn!(line = number + 1, "Skipping malformed block description: {description:?}");
                log.malformed += 1;
            }
        }
    }
    info!(
        blocks = log.metadata.len(),
        malformed = log.malformed,
        "Parsed block log"
    );
    Ok(log)
}

fn parse_block_description(description: &str) -> Option<(NodeId, BlockMetadata)> {
    let mut fields = description.splitn(3, '|');
    let function = fields.next()?.trim();
    let block_name = fields.next()?.trim();
    let (file, range) = fields.next()?.trim().rsplit_once(':')?;
    let (start, end) = range.split_once('-')?;
    let start_line: u32 = start.trim().parse().ok()?;
    let end_line: u32 = end.trim().parse().ok()?;
    if file.is_empty() || function.is_empty() {
        return None;
    }

    let block = BlockMetadata {
        function: function.to_string(),
        start_line,
        end_line,
        block_name: block_name.to_string(),
        belonging_targets: Vec::new(),
    };
    Some((NodeId::new(format!("{file}:{start_line}")), block))
}

/// Finds the first block of the same file whose line range covers `id`.
fn snap<'m>(metadata: &'m StaticMetadata, id: &NodeId) -> Option<(usize, &'m NodeId)> {
    let (file, line) = id.location()?;
    metadata
        .iter()
        .enumerate()
        .find(|(_, (key, block))| {
            key.location().is_some_and(|(f, _)| f == file) && block.contains_line(line)
        })
        .map(|(index, (key, _))| (index, key))
}

/// Merges per-target analyzer graphs into one topology over block start lines.
///
/// Every node is snapped to the block containing it, and that block records the target
/// among its belonging targets. Nodes no block covers are dropped. Edge endpoints are
/// snapped the same way but kept verbatim when nothing covers them, so the graph builder
/// can report them later.
pub fn merge_target_graphs(
    metadata: &mut StaticMetadata,
    graphs: &[(String, RawTopology)],
) -> RawTopology {
    let mut nodes: IndexSet<NodeId> = IndexSet::new();
    let mut edges: IndexSet<(NodeId, NodeId)> = IndexSet::new();

    for (target, graph) in graphs {
        let mut dropped = 0usize;
        for node in &graph.nodes {
            let Some((index, key)) = snap(metadata, node) else {
                dropped += 1;
                continue;
            };
            nodes.insert(key.clone());
            if let Some((_, block)) = metadata.get_index_mut(index) {
                if !block.belonging_targets.contains(target) {
                    block.belonging_targets.push(target.clone());
                }
            }
        }

        for (from, to) in &graph.edges {
            let from = snap(metadata, from).map_or_else(|| from.clone(), |(_, k)| k.clone());
            let to = snap(metadata, to).map_or_else(|| to.clone(), |(_, k)| k.clone());
            edges.insert((from, to));
        }

        debug!(
            %target,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            dropped,
            "Merged target graph"
        );
    }

    RawTopology {
        nodes: nodes.into_iter().collect(),
        edges: edges.into_iter().collect(),
    }
}

/// Collects every `dug.json` under `dir`, named after the directory holding it.
pub fn discover_target_graphs(dir: &Path) -> Result<Vec<(String, RawTopology)>, PrepareError> {
    let mut graphs = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() || entry.file_name() != TARGET_GRAPH_FILE {
            continue;
        }
        let path = entry.path();
        let target = path
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = fs::read(path).map_err(|e| PrepareError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let payload: TopologyPayload =
            serde_json::from_slice(&content).map_err(|e| PrepareError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        debug!(%target, path = %path.display(), "Found target graph");
        graphs.push((target, payload.dugraph));
    }
    graphs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(graphs)
}

/// Writes `additional.json` and `dug.json` into `out_dir`, creating it if needed.
pub fn write_campaign(
    out_dir: &Path,
    metadata: &StaticMetadata,
    topology: RawTopology,
) -> Result<(PathBuf, PathBuf), PrepareError> {
    fs::create_dir_all(out_dir).map_err(|e| PrepareError::Io {
        path: out_dir.to_path_buf(),
        source: e,
    })?;

    let metadata_path = out_dir.join(METADATA_FILE);
    let bytes = serde_json::to_vec(metadata).map_err(|e| PrepareError::Serialize("metadata", e))?;
    write_file(&metadata_path, &bytes)?;

    let topology_path = out_dir.join(TARGET_GRAPH_FILE);
    let payload = TopologyPayload { dugraph: topology };
    let bytes = serde_json::to_vec(&payload).map_err(|e| PrepareError::Serialize("topology", e))?;
    write_file(&topology_path, &bytes)?;

    Ok((metadata_path, topology_path))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), PrepareError> {
    fs::write(path, bytes).map_err(|e| PrepareError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
