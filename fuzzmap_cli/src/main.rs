use fuzzmap_core::bibliography::{Bibliography, Group};
use fuzzmap_core::config::{FuzzmapConfig, InputSettings};
use fuzzmap_core::export::GraphDocument;
use fuzzmap_core::loader::{CampaignInputs, FileSource};
use fuzzmap_core::prepare::{discover_target_graphs, merge_target_graphs, parse_block_log, write_campaign};
use fuzzmap_core::search::search;
use fuzzmap_core::selection::{Focus, SelectionController};
use fuzzmap_core::{Graph, build_graph, inspect};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::fmt::Write as _;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG_FILE: &str = "fuzzmap.toml";

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(short, long, value_parser, global = true)]
    config_file: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

/// Payload paths; each one overrides the `[inputs]` section of the config.
#[derive(Args, Debug, Default)]
struct InputArgs {
    #[clap(long)]
    topology: Option<PathBuf>,
    #[clap(long)]
    replay: Option<PathBuf>,
    #[clap(long)]
    metadata: Option<PathBuf>,
}

impl InputArgs {
    fn apply(self, inputs: &mut InputSettings) {
        if let Some(path) = self.topology {
            inputs.topology = path;
        }
        if let Some(path) = self.replay {
            inputs.replay = path;
        }
        if let Some(path) = self.metadata {
            inputs.metadata = path;
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the block graph and emit it as JSON for the front-end.
    Build {
        #[clap(flatten)]
        inputs: InputArgs,
        /// Block to focus, as an id or a `?k=<id>` query string.
        #[clap(long)]
        focus: Option<String>,
        #[clap(short, long)]
        output: Option<PathBuf>,
        #[clap(long)]
        compact: bool,
    },
    /// Show the info panel of one block.
    Inspect {
        #[clap(flatten)]
        inputs: InputArgs,
        node: String,
    },
    /// List blocks whose id matches a comma-separated search text.
    Search {
        #[clap(flatten)]
        inputs: InputArgs,
        pattern: String,
        #[clap(short, long)]
        limit: Option<usize>,
    },
    /// Browse the directed-fuzzer bibliography.
    Bib {
        file: Option<PathBuf>,
        #[clap(long)]
        filter: Option<String>,
    },
    /// Derive metadata and merged topology payloads from a build log and per-target graphs.
    Prepare {
        #[clap(long)]
        log: PathBuf,
        #[clap(long)]
        dug_dir: PathBuf,
        #[clap(long)]
        out_dir: PathBuf,
    },
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let (mut config, origin) = load_config(cli.config_file)?;
    init_logging(&config.logging.filter);
    info!("Configuration: {origin}");

    let output = run(cli.command, &mut config)?;
    println!("{output}");
    Ok(())
}

fn load_config(config_file: Option<PathBuf>) -> Result<(FuzzmapConfig, String), anyhow::Error> {
    match config_file {
        Some(path) => {
            let config = FuzzmapConfig::load_from_file(&path)?;
            Ok((config, format!("loaded from {path:?}")))
        }
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                let config = FuzzmapConfig::load_from_file(&default_path)?;
                Ok((config, format!("loaded default {default_path:?}")))
            } else {
                Ok((FuzzmapConfig::default(), "built-in defaults".to_string()))
            }
        }
    }
}

fn init_logging(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(command: Command, config: &mut FuzzmapConfig) -> Result<String, anyhow::Error> {
    match command {
        Command::Build {
            inputs,
            focus,
            output,
            compact,
        } => {
            inputs.apply(&mut config.inputs);
            if focus.is_some() {
                config.render.focus = focus;
            }
            if compact {
                config.render.pretty = false;
            }
            run_build(config, output)
        }
        Command::Inspect { inputs, node } => {
            inputs.apply(&mut config.inputs);
            run_inspect(config, &node)
        }
        Command::Search {
            inputs,
            pattern,
            limit,
        } => {
            inputs.apply(&mut config.inputs);
            if let Some(limit) = limit {
                config.render.search_limit = limit;
            }
            run_search(config, &pattern)
        }
        Command::Bib { file, filter } => {
            let path = file
                .or_else(|| config.inputs.bibliography.clone())
                .ok_or_else(|| {
                    anyhow::anyhow!("No bibliography file given and none set in [inputs]")
                })?;
            run_bib(&path, filter.as_deref().unwrap_or(""))
        }
        Command::Prepare {
            log,
            dug_dir,
            out_dir,
        } => run_prepare(&log, &dug_dir, &out_dir),
    }
}

fn load_graph(inputs: &InputSettings) -> Result<(Graph, CampaignInputs), anyhow::Error> {
    let (graph, campaign) = build_graph(
        Arc::new(FileSource::new(&inputs.topology)),
        Arc::new(FileSource::new(&inputs.replay)),
        Arc::new(FileSource::new(&inputs.metadata)),
    )?;
    if !graph.warnings().is_empty() {
        warn!(
            count = graph.warnings().len(),
            "Graph built with data-quality warnings"
        );
    }
    Ok((graph, campaign))
}

fn run_build(config: &FuzzmapConfig, output: Option<PathBuf>) -> Result<String, anyhow::Error> {
    let (graph, campaign) = load_graph(&config.inputs)?;

    let mut selection = SelectionController::new();
    let focus = match config.render.focus.as_deref() {
        Some(query) if query.starts_with('?') => selection.focus_from_query(&graph, query),
        Some(raw) => selection.focus_on(&graph, raw),
        None => Focus::Centered,
    };

    let document = GraphDocument::new(&graph, &focus, campaign.digests);
    let json = document
        .to_json(config.render.pretty)
        .context("Failed to serialize graph document")?;

    match output {
        Some(path) => {
            fs::write(&path, json).with_context(|| format!("Failed to write {path:?}"))?;
            Ok(format!(
                "Wrote {} blocks and {} links to {path:?}",
                graph.len(),
                document.links.len()
            ))
        }
        None => Ok(json),
    }
}

fn run_inspect(config: &FuzzmapConfig, node: &str) -> Result<String, anyhow::Error> {
    let (graph, _) = load_graph(&config.inputs)?;
    let mut selection = SelectionController::new();
    let selected = selection.select(&graph, node)?;
    let report = inspect(&graph, selected.display_id.to_display_form())
        .ok_or_else(|| anyhow::anyhow!("Block {node:?} vanished from the graph"))?;
    Ok(report.to_string())
}

fn run_search(config: &FuzzmapConfig, pattern: &str) -> Result<String, anyhow::Error> {
    let (graph, _) = load_graph(&config.inputs)?;
    let results = search(&graph, pattern, config.render.search_limit)?;

    let mut out = format!("{} matching blocks", results.matches.len());
    for id in results.listed() {
        write!(out, "\n  {id}")?;
    }
    let hidden = results.matches.len() - results.shown;
    if hidden > 0 {
        write!(out, "\n  ... and {hidden} more")?;
    }
    Ok(out)
}

fn run_bib(path: &Path, filter: &str) -> Result<String, anyhow::Error> {
    let bibliography = Bibliography::load_from_file(path)?;
    let filtered = bibliography.filter(filter);

    let mut out = bibliography.summary().to_string();
    for (title, groups) in [
        ("Venues", &filtered.venues),
        ("Targets", &filtered.targets),
        ("Authors", &filtered.authors),
    ] {
        write!(out, "\n\n{title}:")?;
        write_groups(&mut out, &bibliography, groups)?;
    }
    Ok(out)
}

fn write_groups(
    out: &mut String,
    bibliography: &Bibliography,
    groups: &[Group],
) -> Result<(), std::fmt::Error> {
    if groups.is_empty() {
        return write!(out, "\n  (no matches)");
    }
    for group in groups {
        write!(out, "\n  {} ({})", group.name, group.count())?;
        for member in &group.members {
            if let Some(entry) = bibliography.entry(member) {
                write!(out, "\n    {}", entry.citation())?;
            }
        }
    }
    Ok(())
}

fn run_prepare(log: &Path, dug_dir: &Path, out_dir: &Path) -> Result<String, anyhow::Error> {
    let file = fs::File::open(log).with_context(|| format!("Failed to open block log {log:?}"))?;
    let mut block_log = parse_block_log(BufReader::new(file))?;
    let graphs = discover_target_graphs(dug_dir)?;
    if graphs.is_empty() {
        warn!("No target graphs found under {dug_dir:?}");
    }

    let topology = merge_target_graphs(&mut block_log.metadata, &graphs);
    let (node_count, edge_count) = (topology.nodes.len(), topology.edges.len());
    let (metadata_path, topology_path) = write_campaign(out_dir, &block_log.metadata, topology)?;

    Ok(format!(
        "Merged {} target graphs into {node_count} blocks and {edge_count} edges\n\
         Metadata for {} blocks written to {metadata_path:?}\n\
         Merged graph written to {topology_path:?}",
        graphs.len(),
        block_log.metadata.len()
    ))
}
