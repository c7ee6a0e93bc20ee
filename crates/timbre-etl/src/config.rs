use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use timbre_core::FeatureSchema;

/// Configuration for timbre.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (TIMBRE_* prefix)
/// 3. Config file (~/.config/timbre/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Spotify Web API access token with the `user-library-read` scope.
    ///
    /// Can be set via:
    /// - ENV: TIMBRE_ACCESS_TOKEN
    /// - Config: access_token = "..."
    #[serde(default)]
    pub access_token: Option<String>,

    /// Directory holding the persisted library (index, ID tables, snapshot).
    ///
    /// Can be set via:
    /// - CLI: --data-dir /path/to/dir
    /// - ENV: TIMBRE_DATA_DIR
    /// - Default: ~/.local/share/timbre
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Upper bound on saved tracks listed per ingest.
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Number of random-projection trees built per index.
    #[serde(default = "default_tree_count")]
    pub tree_count: usize,

    /// Seed for the index build.
    #[serde(default = "default_index_seed")]
    pub index_seed: u64,

    /// Optional TOML file declaring the feature schema.
    #[serde(default)]
    pub feature_schema: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            access_token: None,
            data_dir: default_data_dir(),
            max_items: default_max_items(),
            tree_count: default_tree_count(),
            index_seed: default_index_seed(),
            feature_schema: None,
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/timbre/config.toml
    /// Reads environment variables with TIMBRE_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("timbre");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder
            .build()
            .context("Failed to build configuration")?;

        Ok(config)
    }

    /// Load configuration with a custom data directory.
    ///
    /// This is used when the --data-dir CLI flag is provided.
    pub fn load_with_data_dir(data_dir: PathBuf) -> Result<Self> {
        let mut config = Self::load()?;
        config.data_dir = data_dir;
        Ok(config)
    }

    /// The feature schema to extract vectors with.
    ///
    /// Falls back to the catalog's 13 numeric audio features when no
    /// schema file is configured.
    pub fn schema(&self) -> Result<FeatureSchema> {
        match &self.feature_schema {
            Some(path) => FeatureSchema::load(path)
                .with_context(|| format!("Failed to load feature schema {}", path.display())),
            None => Ok(FeatureSchema::audio_features()),
        }
    }

    /// The configured access token, or an error naming how to set one.
    pub fn require_access_token(&self) -> Result<&str> {
        self.access_token.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "No Spotify access token configured; set TIMBRE_ACCESS_TOKEN or access_token in {}",
                config_file_path().display()
            )
        })
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("timbre")
}

const fn default_max_items() -> usize {
    crate::ingest::DEFAULT_MAX_ITEMS
}

const fn default_tree_count() -> usize {
    timbre_search::DEFAULT_TREE_COUNT
}

const fn default_index_seed() -> u64 {
    timbre_search::DEFAULT_SEED
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/timbre/config.toml
/// - macOS: ~/Library/Application Support/timbre/config.toml
/// - Windows: %APPDATA%\timbre\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("timbre")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Timbre Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (TIMBRE_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Spotify Web API access token
# Needs the user-library-read scope to list your saved tracks.
#
# Can also be set via:
# - Environment: TIMBRE_ACCESS_TOKEN=your-token-here
access_token = "your-spotify-access-token-here"

# Directory for the persisted library
#
# Holds library.ann (the vector index), forward_ids.json and
# reverse_ids.json (the ID tables), and library.json (the snapshot).
#
# Can also be set via:
# - CLI: timbre --data-dir /custom/dir ingest
# - Environment: TIMBRE_DATA_DIR=/custom/dir
#
# Default: Platform-specific data directory
#data_dir = "/path/to/timbre"

# Maximum number of saved tracks to ingest
#max_items = 5000

# Number of trees in the vector index; more trees give better recall
#tree_count = 10

# Seed for building the index
#index_seed = 42

# Optional feature schema file, e.g.
#
#   [[features]]
#   name = "danceability"
#   kind = "float"
#
#feature_schema = "/path/to/features.toml"
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
