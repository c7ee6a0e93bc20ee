use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use timbre_etl::Config;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "timbre", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Library directory (default: ~/.local/share/timbre)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Ingest your saved tracks and rebuild the similarity index
    ///
    /// Pages through the tracks saved in your Spotify library, fetches
    /// their audio features in batches of 100, and builds a fresh vector
    /// index from every track with a complete feature set.
    ///
    /// Every run starts from scratch: the previous index, ID tables and
    /// snapshot in the library directory are replaced. Tracks whose
    /// features could not be fetched are kept in the snapshot but left
    /// out of the index.
    ///
    /// Requires an access token with the user-library-read scope
    /// (TIMBRE_ACCESS_TOKEN or access_token in the config file).
    Ingest {
        /// Maximum number of saved tracks to ingest
        #[arg(long)]
        max_items: Option<usize>,

        /// Number of trees in the vector index
        #[arg(long)]
        trees: Option<usize>,
    },
    /// Find tracks similar to a saved track
    Similar {
        /// Track ID, spotify:track:... URI, or open.spotify.com URL
        id: String,

        /// Number of similar tracks to return
        #[arg(short, long, default_value_t = timbre_search::DEFAULT_NEIGHBOURS)]
        k: usize,

        /// Print the chat events as JSON lines instead of a list
        #[arg(long)]
        events: bool,
    },
    /// Show what the current library contains
    Status,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print one setting, or the whole config file when no key is given
    Get { key: Option<String> },
    /// Print the config file path
    Path,
    /// Print an example config file
    Example,
    /// Create the config file if it does not exist
    Init,
}

fn load_config(data_dir: Option<PathBuf>) -> Result<Config> {
    match data_dir {
        Some(dir) => Config::load_with_data_dir(dir),
        None => Config::load(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest { max_items, trees } => {
            let mut config = load_config(cli.data_dir)?;
            if let Some(max_items) = max_items {
                config.max_items = max_items;
            }
            if let Some(trees) = trees {
                config.tree_count = trees;
            }
            commands::run_ingest(&config).await?;
        }
        Commands::Similar { id, k, events } => {
            let config = load_config(cli.data_dir)?;
            commands::run_similar(&config, &id, k, events).await?;
        }
        Commands::Status => {
            let config = load_config(cli.data_dir)?;
            commands::show_status(&config)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show_config(cli.data_dir)?,
            ConfigAction::Get { key } => commands::config::get_config(key, cli.data_dir)?,
            ConfigAction::Path => commands::config::show_path()?,
            ConfigAction::Example => commands::config::show_example()?,
            ConfigAction::Init => commands::config::init_config()?,
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_similar_defaults() {
        let cli = Cli::parse_from(["timbre", "similar", "spotify:track:abc"]);
        match cli.command {
            Commands::Similar { id, k, events } => {
                assert_eq!(id, "spotify:track:abc");
                assert_eq!(k, 5);
                assert!(!events);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_data_dir() {
        let cli = Cli::parse_from(["timbre", "ingest", "--data-dir", "/tmp/lib", "--trees", "20"]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/lib")));
        assert!(matches!(
            cli.command,
            Commands::Ingest {
                trees: Some(20),
                max_items: None
            }
        ));
    }
}
