//! Loading of the three campaign payloads behind a join barrier.

use crate::payload::{RawTopology, ReplayData, StaticMetadata, TopologyPayload};
use serde::de::DeserializeOwned;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, mpsc};
use std::thread;
use thiserror::Error;
use tracing::{debug, info};

/// Which of the three payloads an operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Topology,
    Replay,
    Metadata,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PayloadKind::Topology => "topology",
            PayloadKind::Replay => "replay",
            PayloadKind::Metadata => "metadata",
        })
    }
}

/// Fatal failure to obtain one of the payloads. Any of these aborts the whole build.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The payload source could not be read.
    #[error("Failed to read {kind} payload from {origin}: {source}")]
    Io {
        kind: PayloadKind,
        origin: String,
        source: std::io::Error,
    },

    /// The payload was read but is not valid JSON of the expected shape.
    #[error("Failed to parse {kind} payload from {origin}: {source}")]
    Parse {
        kind: PayloadKind,
        origin: String,
        source: serde_json::Error,
    },

    /// The worker loading a payload panicked before reporting a result.
    #[error("Loader for {0} payload terminated unexpectedly")]
    WorkerPanicked(PayloadKind),

    /// No worker thread could be started for the payload.
    #[error("Failed to start loader for {kind} payload: {source}")]
    Spawn {
        kind: PayloadKind,
        source: std::io::Error,
    },
}

impl LoadError {
    pub fn kind(&self) -> PayloadKind {
        match self {
            LoadError::Io { kind, .. }
            | LoadError::Parse { kind, .. }
            | LoadError::WorkerPanicked(kind)
            | LoadError::Spawn { kind, .. } => *kind,
        }
    }
}

/// Somewhere a payload's raw bytes can be fetched from.
///
/// Implementations must be `Send + Sync` because the three payloads are fetched on
/// separate worker threads, which may outlive a failed load.
pub trait PayloadSource: Send + Sync {
    /// Human-readable origin, used in error messages and logs.
    fn origin(&self) -> String;

    /// Fetches the raw payload bytes.
    fn fetch(&self) -> Result<Vec<u8>, std::io::Error>;
}

/// A payload stored in a file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PayloadSource for FileSource {
    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> Result<Vec<u8>, std::io::Error> {
        fs::read(&self.path)
    }
}

/// A payload already held in memory.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    label: String,
    bytes: Vec<u8>,
}

impl InMemorySource {
    pub fn new(label: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            label: label.into(),
            bytes: bytes.into(),
        }
    }
}

impl PayloadSource for InMemorySource {
    fn origin(&self) -> String {
        format!("<{}>", self.label)
    }

    fn fetch(&self) -> Result<Vec<u8>, std::io::Error> {
        Ok(self.bytes.clone())
    }
}

/// Hex MD5 digests of the raw payloads, identifying the exact campaign inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SourceDigests {
    pub topology: String,
    pub replay: String,
    pub metadata: String,
}

/// The three payloads, parsed and ready for the graph builder.
#[derive(Debug, Clone)]
pub struct CampaignInputs {
    pub topology: RawTopology,
    pub replay: ReplayData,
    pub metadata: StaticMetadata,
    pub digests: SourceDigests,
}

enum Loaded {
    Topology(TopologyPayload),
    Replay(ReplayData),
    Metadata(StaticMetadata),
}

/// Fetches and parses one payload.
pub fn load_payload<T: DeserializeOwned>(
    kind: PayloadKind,
    source: &dyn PayloadSource,
) -> Result<(T, String), LoadError> {
    let origin = source.origin();
    let bytes = source.fetch().map_err(|e| LoadError::Io {
        kind,
        origin: origin.clone(),
        source: e,
    })?;
    let digest = format!("{:x}", md5::compute(&bytes));
    let parsed = serde_json::from_slice(&bytes).map_err(|e| LoadError::Parse {
        kind,
        origin: origin.clone(),
        source: e,
    })?;
    debug!(%kind, %origin, bytes = bytes.len(), %digest, "Loaded payload");
    Ok((parsed, digest))
}

/// Loads all three payloads concurrently and waits until every one has arrived.
///
/// Each payload is fetched and parsed on its own worker thread. The first failure to
/// reach the barrier is returned at once; workers still running are detached and their
/// late results discarded, so callers either get all three payloads or a single error.
pub fn load_inputs(
    topology: Arc<dyn PayloadSource>,
    replay: Arc<dyn PayloadSource>,
    metadata: Arc<dyn PayloadSource>,
) -> Result<CampaignInputs, LoadError> {
    let (sender, receiver) = mpsc::channel();
    let jobs = [
        (PayloadKind::Topology, topology),
        (PayloadKind::Replay, replay),
        (PayloadKind::Metadata, metadata),
    ];

    for (kind, source) in jobs {
        let sender = sender.clone();
        thread::Builder::new()
            .name(format!("load-{kind}"))
            .spawn(move || {
                let source = source.as_ref();
                let result = match kind {
                    PayloadKind::Topology => {
                        load_payload(kind, source).map(|(p, d)| (Loaded::Topology(p), d))
                    }
                    PayloadKind::Replay => {
                        load_payload(kind, source).map(|(p, d)| (Loaded::Replay(p), d))
                    }
                    PayloadKind::Metadata => {
                        load_payload(kind, source).map(|(p, d)| (Loaded::Metadata(p), d))
                    }
                };
                // The receiver is gone only if an earlier failure was already returned.
                let _ = sender.send((kind, result));
            })
            .map_err(|e| LoadError::Spawn { kind, source: e })?;
    }
    // A panicking worker drops its sender without reporting; `gather` sees the empty slot.
    drop(sender);

    gather(receiver)
}

type LoadResult = Result<(Loaded, String), LoadError>;

fn gather(receiver: mpsc::Receiver<(PayloadKind, LoadResult)>) -> Result<CampaignInputs, LoadError> {
    let mut topology_payload = None;
    let mut replay_payload = None;
    let mut metadata_payload = None;
    let mut digests = SourceDigests::default();

    for (kind, result) in receiver.iter() {
        let (loaded, digest) = result?;
        match loaded {
            Loaded::Topology(p) => {
                topology_payload = Some(p);
                digests.topology = digest;
            }
            Loaded::Replay(p) => {
                replay_payload = Some(p);
                digests.replay = digest;
            }
            Loaded::Metadata(p) => {
                metadata_payload = Some(p);
                digests.metadata = digest;
            }
        }
        debug!(%kind, "Payload reached the barrier");
    }

    let topology_payload =
        topology_payload.ok_or(LoadError::WorkerPanicked(PayloadKind::Topology))?;
    let replay = replay_payload.ok_or(LoadError::WorkerPanicked(PayloadKind::Replay))?;
    let metadata = metadata_payload.ok_or(LoadError::WorkerPanicked(PayloadKind::Metadata))?;

    info!(
        nodes = topology_payload.dugraph.nodes.len(),
        edges = topology_payload.dugraph.edges.len(),
        visited = replay.visit_counts.len(),
        targets = replay.targets.len(),
        blocks = metadata.len(),
        "All campaign payloads loaded"
    );

    Ok(CampaignInputs {
        topology: topology_payload.dugraph,
        replay,
        metadata,
        digests,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    /// Serves its payload only after a delay.
    struct SlowSource {
        delay: Duration,
        bytes: &'static str,
    }

    impl PayloadSource for SlowSource {
        fn origin(&self) -> String {
            "<slow>".to_string()
        }

        fn fetch(&self) -> Result<Vec<u8>, std::io::Error> {
            thread::sleep(self.delay);
            Ok(self.bytes.as_bytes().to_vec())
        }
    }

    struct PanickingSource;

    impl PayloadSource for PanickingSource {
        fn origin(&self) -> String {
            "<panicking>".to_string()
        }

        fn fetch(&self) -> Result<Vec<u8>, std::io::Error> {
            panic!("storage backend vanished");
        }
    }

    const TOPOLOGY: &str = r#"{"dugraph": {"nodes": ["f:1", "f:2"], "edges": [["f:1", "f:2"]]}}"#;
    const REPLAY: &str = r#"{"visit": {"f:1": 3}, "targets": {"f:2": "bug1"}}"#;
    const METADATA: &str =
        r#"{"f:1": {"func": "f", "start": 1, "end": 1, "bb": "entry", "belonging targets": []}}"#;

    #[test]
    fn loads_all_three_payloads_from_memory() {
        let inputs = load_inputs(
            Arc::new(InMemorySource::new("dug", TOPOLOGY)),
            Arc::new(InMemorySource::new("replay", REPLAY)),
            Arc::new(InMemorySource::new("additional", METADATA)),
        )
        .expect("All payloads are valid");

        assert_eq!(inputs.topology.nodes.len(), 2);
        assert_eq!(inputs.replay.targets.len(), 1);
        assert_eq!(inputs.metadata.len(), 1);
        assert_eq!(
            inputs.digests.topology,
            format!("{:x}", md5::compute(TOPOLOGY.as_bytes()))
        );
    }

    #[test]
    fn loads_payloads_from_files() {
        let dir = tempdir().unwrap();
        let mut paths = Vec::new();
        for (name, body) in [
            ("dug.json", TOPOLOGY),
            ("replay.json", REPLAY),
            ("additional.json", METADATA),
        ] {
            let path = dir.path().join(name);
            let mut file = fs::File::create(&path).unwrap();
            file.write_all(body.as_bytes()).unwrap();
            paths.push(path);
        }

        let inputs = load_inputs(
            Arc::new(FileSource::new(&paths[0])),
            Arc::new(FileSource::new(&paths[1])),
            Arc::new(FileSource::new(&paths[2])),
        )
        .expect("Files hold valid payloads");
        assert_eq!(inputs.replay.visit_counts.len(), 1);
    }

    #[test]
    fn missing_file_aborts_the_whole_load() {
        let dir = tempdir().unwrap();
        let err = load_inputs(
            Arc::new(InMemorySource::new("dug", TOPOLOGY)),
            Arc::new(FileSource::new(dir.path().join("replay.json"))),
            Arc::new(InMemorySource::new("additional", METADATA)),
        )
        .expect_err("A missing replay file must fail the load");

        assert_eq!(err.kind(), PayloadKind::Replay);
        assert!(matches!(err, LoadError::Io { .. }), "Expected Io error, got {err:?}");
        assert!(err.to_string().contains("replay.json"));
    }

    #[test]
    fn malformed_json_is_a_parse_failure() {
        let err = load_inputs(
            Arc::new(InMemorySource::new("dug", r#"{"dugraph": {"nodes": [1, 2]}}"#)),
            Arc::new(InMemorySource::new("replay", REPLAY)),
            Arc::new(InMemorySource::new("additional", METADATA)),
        )
        .expect_err("Numeric node ids are not valid");

        assert_eq!(err.kind(), PayloadKind::Topology);
        assert!(matches!(err, LoadError::Parse { .. }), "Expected Parse error, got {err:?}");
    }

    #[test]
    fn topology_without_dugraph_key_is_rejected() {
        let result = load_payload::<TopologyPayload>(
            PayloadKind::Topology,
            &InMemorySource::new("dug", r#"{"nodes": []}"#),
        );
        assert!(result.is_err());
    }

    #[test]
    fn first_failure_returns_without_waiting_for_slow_loads() {
        let started = Instant::now();
        let err = load_inputs(
            Arc::new(InMemorySource::new("dug", "{not json")),
            Arc::new(SlowSource {
                delay: Duration::from_secs(3),
                bytes: REPLAY,
            }),
            Arc::new(InMemorySource::new("additional", METADATA)),
        )
        .expect_err("Broken topology must fail the load");

        assert_eq!(err.kind(), PayloadKind::Topology);
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "Load took {:?}, it should not wait for the slow replay fetch",
            started.elapsed()
        );
    }

    #[test]
    fn panicking_source_is_reported_as_worker_failure() {
        let err = load_inputs(
            Arc::new(InMemorySource::new("dug", TOPOLOGY)),
            Arc::new(InMemorySource::new("replay", REPLAY)),
            Arc::new(PanickingSource),
        )
        .expect_err("A panicking fetch must fail the load");

        assert!(
            matches!(err, LoadError::WorkerPanicked(PayloadKind::Metadata)),
            "Expected WorkerPanicked(Metadata), got {err:?}"
        );
    }
}
