//! "Tracks similar to X" over a persisted library.

use timbre_core::{CatalogId, CatalogItem, FeatureSchema, IdentifierBridge, IndexPosition, ResponseEvent};
use timbre_search::VectorIndex;

use crate::error::{LibraryError, QueryError};
use crate::library::LibraryStore;
use crate::source::CatalogSource;

pub const SIMILAR_INTRO: &str = "Here are some similar tracks.";
pub const NO_SIMILAR: &str = "I couldn't find any similar tracks.";

/// Read-only view over one ingested library plus a live catalog source
/// for fresh metadata.
#[derive(Debug)]
pub struct SimilarityService<S> {
    index: VectorIndex,
    bridge: IdentifierBridge,
    source: S,
}

impl<S: CatalogSource> SimilarityService<S> {
    pub fn new(index: VectorIndex, bridge: IdentifierBridge, source: S) -> Self {
        Self {
            index,
            bridge,
            source,
        }
    }

    /// Load the index and ID tables from `store`.
    ///
    /// `schema` must be the one the library was ingested with.
    pub fn open(store: &LibraryStore, schema: &FeatureSchema, source: S) -> Result<Self, LibraryError> {
        let index = store.load_index(schema.len())?;
        let bridge = store.load_bridge()?;
        log::debug!(
            "Opened library with {} indexed of {} bound tracks",
            index.len(),
            bridge.len()
        );
        Ok(Self::new(index, bridge, source))
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn bridge(&self) -> &IdentifierBridge {
        &self.bridge
    }

    /// Positions of up to `k` tracks near `id`, excluding `id` itself.
    ///
    /// `None` when the ID is unknown, bound but not indexed, or has no
    /// neighbours.
    pub fn neighbours(&self, id: &CatalogId, k: usize) -> Result<Option<Vec<IndexPosition>>, QueryError> {
        if k == 0 {
            return Ok(None);
        }

        let position = match self.bridge.resolve_to_position(id) {
            Ok(position) => position,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let found = match self.index.query(position, k.saturating_add(1)) {
            Ok(found) => found,
            Err(e) if e.is_not_found() => {
                log::debug!("{} is bound to {} but was never indexed", id, position);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let neighbours: Vec<IndexPosition> = found
            .into_iter()
            .filter(|&p| p != position)
            .take(k)
            .collect();

        Ok((!neighbours.is_empty()).then_some(neighbours))
    }

    /// Up to `k` tracks similar to `raw_id`, nearest first.
    ///
    /// `raw_id` may be a bare ID, a catalog URI, or a web URL. Metadata is
    /// fetched fresh from the source. Neighbours the source no longer
    /// knows are skipped.
    pub async fn find_similar(&self, raw_id: &str, k: usize) -> Result<Option<Vec<CatalogItem>>, QueryError> {
        let id = CatalogId::parse(raw_id);
        let Some(neighbours) = self.neighbours(&id, k)? else {
            return Ok(None);
        };

        let mut items = Vec::with_capacity(neighbours.len());
        for position in neighbours {
            let neighbour_id = self.bridge.resolve_to_external_id(position)?;
            match self.source.item(neighbour_id).await {
                Ok(mut item) => {
                    item.position = Some(position);
                    items.push(item);
                }
                Err(e) if e.is_not_found() => {
                    log::warn!("Similar track {} is no longer in the catalog", neighbour_id);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok((!items.is_empty()).then_some(items))
    }
}

/// Chat events answering "tracks similar to `raw_id`".
///
/// Never fails: any lookup failure becomes the "no similar tracks"
/// message.
pub async fn similar_tracks_events<S: CatalogSource>(
    service: &SimilarityService<S>,
    raw_id: &str,
    k: usize,
) -> Vec<ResponseEvent> {
    let items = match service.find_similar(raw_id, k).await {
        Ok(Some(items)) => items,
        Ok(None) => return vec![ResponseEvent::message(NO_SIMILAR)],
        Err(e) => {
            log::warn!("Similar-track lookup for {} failed: {}", raw_id, e);
            return vec![ResponseEvent::message(NO_SIMILAR)];
        }
    };

    let mut events = Vec::with_capacity(items.len() + 1);
    events.push(ResponseEvent::message(SIMILAR_INTRO));
    for item in &items {
        let event = match service.source().embed_html(item).await {
            Ok(Some(html)) => ResponseEvent::Embed(html),
            Ok(None) => ResponseEvent::message(item.chat_string()),
            Err(e) => {
                log::debug!("No embed for {}: {}", item.external_id, e);
                ResponseEvent::message(item.chat_string())
            }
        };
        events.push(event);
    }
    events
}
