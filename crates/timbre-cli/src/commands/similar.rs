use anyhow::{Context, Result};
use timbre_etl::similar::NO_SIMILAR;
use timbre_etl::{similar_tracks_events, Config, LibraryStore, SimilarityService, SpotifyClient};

pub async fn run_similar(config: &Config, raw_id: &str, k: usize, events: bool) -> Result<()> {
    let token = config.require_access_token()?;
    let client = SpotifyClient::new(token).context("Failed to create Spotify client")?;
    let store = LibraryStore::new(&config.data_dir);
    let schema = config.schema()?;

    let service = SimilarityService::open(&store, &schema, client)
        .context("Failed to open library")?;

    if events {
        for event in similar_tracks_events(&service, raw_id, k).await {
            println!("{}", serde_json::to_string(&event)?);
        }
        return Ok(());
    }

    match service.find_similar(raw_id, k).await {
        Ok(Some(items)) => {
            println!("\nTracks similar to {raw_id}:\n");
            for (rank, item) in items.iter().enumerate() {
                println!("  {:>2}. {}", rank + 1, item.chat_string());
                if let Some(url) = &item.url {
                    println!("      {url}");
                }
            }
        }
        Ok(None) => println!("{NO_SIMILAR}"),
        Err(e) => {
            log::warn!("Similar-track lookup failed: {e}");
            println!("{NO_SIMILAR}");
        }
    }

    Ok(())
}
