pub mod bibliography;
pub mod builder;
pub mod config;
pub mod distance;
pub mod export;
pub mod graph;
pub mod inspect;
pub mod loader;
pub mod node_id;
pub mod payload;
pub mod prepare;
pub mod rank;
pub mod search;
pub mod selection;

pub use bibliography::{Bibliography, BibliographyError, FuzzerEntry};
pub use builder::{BuildWarning, GraphBuilder};
pub use config::FuzzmapConfig;
pub use distance::{Distance, compute_distances};
pub use export::GraphDocument;
pub use graph::{Edge, Graph, GraphNode};
pub use inspect::{NodeReport, inspect};
pub use loader::{
    CampaignInputs, FileSource, InMemorySource, LoadError, PayloadKind, PayloadSource,
    load_inputs,
};
pub use node_id::{NodeId, denormalize, normalize};
pub use payload::{BlockMetadata, RawTopology, ReplayData, StaticMetadata};
pub use prepare::PrepareError;
pub use rank::{Rank, compute_ranks};
pub use search::{SearchError, SearchResults, search};
pub use selection::{Focus, SelectionController, SelectionError};

use std::sync::Arc;

/// Loads the three payloads and builds the block graph from them.
pub fn build_graph(
    topology: Arc<dyn PayloadSource>,
    replay: Arc<dyn PayloadSource>,
    metadata: Arc<dyn PayloadSource>,
) -> Result<(Graph, CampaignInputs), LoadError> {
    let inputs = load_inputs(topology, replay, metadata)?;
    let graph = GraphBuilder::new(&inputs.topology, &inputs.replay, &inputs.metadata).build();
    Ok((graph, inputs))
}
