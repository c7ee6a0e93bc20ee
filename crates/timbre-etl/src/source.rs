//! The catalog capability the ingestion pipeline and the similarity
//! service need.
//!
//! Authentication happens before a source is constructed; implementations
//! are handed an already-authorized client.

use async_trait::async_trait;
use timbre_core::{Attributes, CatalogId, CatalogItem};

use crate::error::SourceResult;

/// One page of the user's saved tracks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedPage {
    /// Tracks usable for ingestion.
    pub items: Vec<CatalogItem>,
    /// Entries the source returned for the page, including ones dropped
    /// from `items` (local files have no catalog ID).
    pub raw_len: usize,
}

impl SavedPage {
    #[must_use]
    pub fn new(items: Vec<CatalogItem>, raw_len: usize) -> Self {
        Self { items, raw_len }
    }

    /// Whether the source has no more entries at this offset.
    #[must_use]
    pub const fn is_end(&self) -> bool {
        self.raw_len == 0
    }

    /// Entries dropped from this page.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.raw_len.saturating_sub(self.items.len())
    }
}

impl From<Vec<CatalogItem>> for SavedPage {
    fn from(items: Vec<CatalogItem>) -> Self {
        let raw_len = items.len();
        Self { items, raw_len }
    }
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// One page of the user's saved tracks, newest first.
    ///
    /// A page with no raw entries means the end of the library; a page
    /// whose entries were all dropped does not.
    async fn saved_items(&self, offset: usize, limit: usize) -> SourceResult<SavedPage>;

    /// Audio-feature payloads for a batch of IDs.
    ///
    /// The result is aligned with `ids`; an entry is `None` when the
    /// source has no features for that ID.
    async fn audio_features(&self, ids: &[CatalogId]) -> SourceResult<Vec<Option<Attributes>>>;

    /// Fresh metadata for a single track.
    async fn item(&self, id: &CatalogId) -> SourceResult<CatalogItem>;

    /// Embeddable player HTML for a track, if the source offers one.
    async fn embed_html(&self, _item: &CatalogItem) -> SourceResult<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timbre_core::CatalogId;

    #[test]
    fn test_page_from_items_counts_every_item() {
        let page = SavedPage::from(vec![CatalogItem::new(
            CatalogId::new("a"),
            "A",
            "spotify:track:a",
        )]);
        assert_eq!(page.raw_len, 1);
        assert_eq!(page.skipped(), 0);
        assert!(!page.is_end());
    }

    #[test]
    fn test_all_dropped_page_is_not_the_end() {
        let page = SavedPage::new(Vec::new(), 50);
        assert!(!page.is_end());
        assert_eq!(page.skipped(), 50);
        assert!(SavedPage::default().is_end());
    }
}
