use anyhow::{Context, Result};
use std::path::PathBuf;
use timbre_etl::{config, Config};

const VALID_KEYS: &str =
    "access_token, data_dir, max_items, tree_count, index_seed, feature_schema";

fn load(data_dir: Option<PathBuf>) -> Result<Config> {
    match data_dir {
        Some(dir) => Config::load_with_data_dir(dir),
        None => Config::load(),
    }
}

fn mask(token: Option<&str>) -> String {
    match token {
        Some(t) if t.chars().count() > 8 => format!("{}…", t.chars().take(8).collect::<String>()),
        Some(_) => "<set>".to_string(),
        None => "<not set>".to_string(),
    }
}

/// Show the current effective configuration.
pub fn show_config(data_dir: Option<PathBuf>) -> Result<()> {
    let config = load(data_dir)?;

    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config::config_file_path().display());

    let exists = config::config_file_path().exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    println!("Settings:");
    println!("  access_token: {}", mask(config.access_token.as_deref()));
    println!("  data_dir: {}", config.data_dir.display());
    println!("  max_items: {}", config.max_items);
    println!("  tree_count: {}", config.tree_count);
    println!("  index_seed: {}", config.index_seed);
    println!(
        "  feature_schema: {}",
        config
            .feature_schema
            .as_ref()
            .map_or_else(|| "<built-in audio features>".to_string(), |p| p.display().to_string())
    );

    println!("\nPriority: CLI args > ENV vars (TIMBRE_*) > Config file > Defaults");

    Ok(())
}

/// Get a specific config value.
pub fn get_config(key: Option<String>, data_dir: Option<PathBuf>) -> Result<()> {
    let Some(key) = key else {
        let config_path = config::config_file_path();

        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            print!("{}", contents);
        } else {
            println!("Config file does not exist: {}", config_path.display());
            println!("\nRun 'timbre config init' to create it.");
        }
        return Ok(());
    };

    let config = load(data_dir)?;
    match key.as_str() {
        "access_token" => println!(
            "{}",
            config.access_token.unwrap_or_else(|| String::from("<not set>"))
        ),
        "data_dir" => println!("{}", config.data_dir.display()),
        "max_items" => println!("{}", config.max_items),
        "tree_count" => println!("{}", config.tree_count),
        "index_seed" => println!("{}", config.index_seed),
        "feature_schema" => println!(
            "{}",
            config
                .feature_schema
                .map_or_else(|| String::from("<not set>"), |p| p.display().to_string())
        ),
        _ => anyhow::bail!("Unknown config key: {}\n\nValid keys: {}", key, VALID_KEYS),
    }

    Ok(())
}

/// Show the config file path.
pub fn show_path() -> Result<()> {
    println!("{}", config::config_file_path().display());
    Ok(())
}

/// Show example configuration.
pub fn show_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to set your Spotify access token.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_hides_token() {
        assert_eq!(mask(None), "<not set>");
        assert_eq!(mask(Some("short")), "<set>");
        assert_eq!(mask(Some("BQDabcdefghijkl")), "BQDabcde…");
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        let result = get_config(Some("nope".to_string()), None);
        assert!(result.is_err());
    }
}
