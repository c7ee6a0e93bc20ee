//! Library ingestion.
//!
//! One run pages through the user's saved tracks, assigns each a dense
//! position and binds it in a fresh [`IdentifierBridge`], hydrates audio
//! features in batches, and builds a fresh [`VectorIndex`] from every item
//! whose feature vector is complete. Runs are sequential and rebuild
//! everything; there is no incremental update.

use serde::{Deserialize, Serialize};

use timbre_core::{CatalogId, CatalogItem, FeatureSchema, IdentifierBridge, IndexPosition};
use timbre_search::{VectorIndex, DEFAULT_SEED, DEFAULT_TREE_COUNT};

use crate::error::IngestError;
use crate::library::LibraryStore;
use crate::source::CatalogSource;

/// Default upper bound on listed tracks.
pub const DEFAULT_MAX_ITEMS: usize = 5000;

/// Saved tracks requested per page.
pub const PAGE_SIZE: usize = 50;

/// IDs per audio-feature request.
pub const FEATURE_BATCH_SIZE: usize = 100;

/// Knobs for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub max_items: usize,
    pub tree_count: usize,
    pub seed: u64,
    pub schema: FeatureSchema,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
            tree_count: DEFAULT_TREE_COUNT,
            seed: DEFAULT_SEED,
            schema: FeatureSchema::audio_features(),
        }
    }
}

/// Counters describing one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Items returned by the listing.
    pub listed: usize,
    /// Items that received an audio-feature payload.
    pub hydrated: usize,
    /// Items inserted into the vector index.
    pub indexed: usize,
    /// Items kept in the snapshot but left out of the index.
    pub excluded: usize,
    /// Feature batches whose request failed.
    pub failed_batches: usize,
}

/// Everything a run produces, ready to be persisted.
#[derive(Debug, Clone)]
pub struct LibraryIngest {
    /// All listed items in listing order, hydrated where possible.
    pub items: Vec<CatalogItem>,
    pub bridge: IdentifierBridge,
    pub index: VectorIndex,
    pub report: IngestReport,
}

/// Run a full ingestion against `source`.
///
/// # Errors
///
/// A failed listing page aborts the run with [`IngestError::Listing`]; a
/// duplicate ID within the listing aborts with [`IngestError::Bridge`].
/// Failed feature batches are logged and counted, not returned.
pub async fn ingest<S>(source: &S, options: &IngestOptions) -> Result<LibraryIngest, IngestError>
where
    S: CatalogSource + ?Sized,
{
    let mut bridge = IdentifierBridge::new();
    let mut items = list_saved_items(source, options.max_items, &mut bridge).await?;
    let mut report = IngestReport {
        listed: items.len(),
        ..IngestReport::default()
    };
    log::info!("Listed {} saved tracks", report.listed);

    report.failed_batches = hydrate(source, &mut items).await;
    report.hydrated = items.iter().filter(|item| item.is_hydrated()).count();
    log::info!(
        "Hydrated {} of {} tracks ({} failed batches)",
        report.hydrated,
        report.listed,
        report.failed_batches
    );

    let index = build_index(&items, options, &mut report)?;
    log::info!(
        "Built index of {} tracks with {} trees ({} excluded)",
        report.indexed,
        options.tree_count,
        report.excluded
    );

    Ok(LibraryIngest {
        items,
        bridge,
        index,
        report,
    })
}

/// Run [`ingest`] and persist the result into `store`.
pub async fn ingest_into<S>(
    source: &S,
    options: &IngestOptions,
    store: &LibraryStore,
) -> Result<IngestReport, IngestError>
where
    S: CatalogSource + ?Sized,
{
    let library = ingest(source, options).await?;
    store.save(&library)?;
    Ok(library.report)
}

/// Page through the saved library, binding each item as it arrives.
async fn list_saved_items<S>(
    source: &S,
    max_items: usize,
    bridge: &mut IdentifierBridge,
) -> Result<Vec<CatalogItem>, IngestError>
where
    S: CatalogSource + ?Sized,
{
    let mut items = Vec::new();
    let mut next_position = IndexPosition::default();
    let mut offset = 0;

    while offset < max_items {
        let limit = PAGE_SIZE.min(max_items - offset);
        let page = source
            .saved_items(offset, limit)
            .await
            .map_err(|source| IngestError::Listing { offset, source })?;

        if page.is_end() {
            break;
        }
        log::debug!("Listed {} tracks at offset {}", page.items.len(), offset);
        if page.skipped() > 0 {
            log::info!(
                "Skipped {} saved entries without a catalog ID at offset {}",
                page.skipped(),
                offset
            );
        }

        for mut item in page.items.into_iter().take(limit) {
            bridge.bind(item.external_id.clone(), next_position)?;
            item.position = Some(next_position);
            next_position = next_position.next();
            items.push(item);
        }

        offset += limit;
    }

    Ok(items)
}

/// Attach audio features in batches; returns the number of failed batches.
async fn hydrate<S>(source: &S, items: &mut [CatalogItem]) -> usize
where
    S: CatalogSource + ?Sized,
{
    let mut failed = 0;

    for (batch_no, batch) in items.chunks_mut(FEATURE_BATCH_SIZE).enumerate() {
        let ids: Vec<CatalogId> = batch.iter().map(|item| item.external_id.clone()).collect();

        match source.audio_features(&ids).await {
            Ok(features) => {
                for (item, attributes) in batch.iter_mut().zip(features) {
                    item.attributes = attributes;
                }
            }
            Err(e) => {
                failed += 1;
                log::warn!(
                    "Audio features for batch {} ({} tracks) failed: {}",
                    batch_no,
                    ids.len(),
                    e
                );
            }
        }
    }

    failed
}

fn build_index(
    items: &[CatalogItem],
    options: &IngestOptions,
    report: &mut IngestReport,
) -> Result<VectorIndex, IngestError> {
    let schema = &options.schema;
    let mut index = VectorIndex::create(schema.len())?.with_seed(options.seed);

    for item in items {
        let Some(position) = item.position else {
            continue;
        };
        if !item.is_hydrated() {
            report.excluded += 1;
            continue;
        }

        let vector = schema.extract(item);
        if vector.len() != schema.len() {
            log::debug!(
                "Excluding {} from the index: missing {:?}",
                item.external_id,
                schema.missing(item)
            );
            report.excluded += 1;
            continue;
        }

        index.insert(position, &vector)?;
        report.indexed += 1;
    }

    index.build(options.tree_count)?;
    Ok(index)
}
