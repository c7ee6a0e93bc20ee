use anyhow::Result;
use timbre_etl::{Config, LibraryStore};

pub fn show_status(config: &Config) -> Result<()> {
    let store = LibraryStore::new(&config.data_dir);

    println!("\n📊 Timbre Status\n");
    println!("  Library: {}", store.dir().display());

    if !store.exists() {
        println!("  No library yet.");
        println!("\n  Run `timbre ingest` to build one");
        return Ok(());
    }

    let snapshot = store.load_snapshot()?;
    let report = snapshot.report;
    println!("  Ingested: {}", snapshot.ingested_at.format("%Y-%m-%d %H:%M UTC"));
    println!("  Features per track: {}", snapshot.n_features);
    println!("  Tracks listed: {}", report.listed);
    println!("  Tracks indexed: {}", report.indexed);
    println!("  Tracks excluded: {}", report.excluded);
    if report.failed_batches > 0 {
        println!("  Failed feature batches: {}", report.failed_batches);
    }

    println!("\n  The index is rebuilt from scratch; run `timbre ingest` to pick up new saves");

    Ok(())
}
