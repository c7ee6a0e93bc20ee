use anyhow::{Context, Result};
use timbre_etl::{ingest_into, Config, IngestOptions, LibraryStore, SpotifyClient};

pub async fn run_ingest(config: &Config) -> Result<()> {
    let token = config.require_access_token()?;
    let client = SpotifyClient::new(token).context("Failed to create Spotify client")?;
    let store = LibraryStore::new(&config.data_dir);

    let options = IngestOptions {
        max_items: config.max_items,
        tree_count: config.tree_count,
        seed: config.index_seed,
        schema: config.schema()?,
    };

    log::info!(
        "Ingesting up to {} saved tracks into {}",
        options.max_items,
        store.dir().display()
    );

    let report = ingest_into(&client, &options, &store)
        .await
        .context("Ingestion failed")?;

    println!("\n✓ Ingest complete\n");
    println!("  Listed:   {}", report.listed);
    println!("  Hydrated: {}", report.hydrated);
    println!("  Indexed:  {}", report.indexed);
    println!("  Excluded: {}", report.excluded);
    if report.failed_batches > 0 {
        println!(
            "\n  ⚠ {} feature batches failed; run `timbre ingest` again to retry them",
            report.failed_batches
        );
    }

    Ok(())
}
