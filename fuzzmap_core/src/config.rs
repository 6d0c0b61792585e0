use serde::Deserialize;
use std::path::PathBuf;

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct InputSettings {
    #[serde(default = "default_topology_path")]
    pub topology: PathBuf,
    #[serde(default = "default_replay_path")]
    pub replay: PathBuf,
    #[serde(default = "default_metadata_path")]
    pub metadata: PathBuf,
    #[serde(default)]
    pub bibliography: Option<PathBuf>,
}

pub fn default_topology_path() -> PathBuf {
    PathBuf::from("dug.json")
}

pub fn default_replay_path() -> PathBuf {
    PathBuf::from("replay.json")
}

pub fn default_metadata_path() -> PathBuf {
    PathBuf::from("additional.json")
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            topology: default_topology_path(),
            replay: default_replay_path(),
            metadata: default_metadata_path(),
            bibliography: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct RenderSettings {
    /// Block to pre-select after the graph is built, in either id form.
    #[serde(default)]
    pub focus: Option<String>,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

pub fn default_search_limit() -> usize {
    10
}

fn default_pretty() -> bool {
    true
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            focus: None,
            search_limit: default_search_limit(),
            pretty: default_pretty(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// `tracing-subscriber` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

pub fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct FuzzmapConfig {
    #[serde(default)]
    pub inputs: InputSettings,
    #[serde(default)]
    pub render: RenderSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl FuzzmapConfig {
    pub fn load_from_file(path: &PathBuf) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        let config: FuzzmapConfig = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })?;

        Ok(config)
    }
}
