use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::model::ids::{CatalogId, IndexPosition};

/// Raw audio-feature payload of one track, keyed by attribute name.
pub type Attributes = Map<String, Value>;

/// A name plus catalog URI, used for the credited artist and the album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub name: String,
    pub uri: String,
}

impl NamedRef {
    #[must_use]
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
        }
    }
}

/// One track from the user's saved library.
///
/// Created per page of a bulk fetch, then hydrated once with its raw
/// audio-feature payload. Only persisted as part of the library snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub external_id: CatalogId,

    /// Display name of the track.
    pub name: String,

    /// Catalog URI (e.g. `spotify:track:...`).
    pub uri: String,

    /// Public web URL, when the catalog provides one.
    pub url: Option<String>,

    /// First credited artist.
    pub artist: Option<NamedRef>,

    pub album: Option<NamedRef>,

    /// Position assigned during ingestion. `None` for items fetched
    /// outside an ingestion run.
    pub position: Option<IndexPosition>,

    /// Raw audio-feature payload. `None` until hydrated, and stays `None`
    /// when hydration failed.
    pub attributes: Option<Attributes>,
}

impl CatalogItem {
    #[must_use]
    pub fn new(external_id: CatalogId, name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            external_id,
            name: name.into(),
            uri: uri.into(),
            url: None,
            artist: None,
            album: None,
            position: None,
            attributes: None,
        }
    }

    #[must_use]
    pub fn with_artist(mut self, artist: NamedRef) -> Self {
        self.artist = Some(artist);
        self
    }

    #[must_use]
    pub fn with_album(mut self, album: NamedRef) -> Self {
        self.album = Some(album);
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Whether an audio-feature payload has been attached.
    #[must_use]
    pub const fn is_hydrated(&self) -> bool {
        self.attributes.is_some()
    }

    /// Short human description: "Title by Artist from Album".
    #[must_use]
    pub fn chat_string(&self) -> String {
        let mut out = self.name.clone();
        if let Some(artist) = &self.artist {
            out.push_str(" by ");
            out.push_str(&artist.name);
        }
        if let Some(album) = &self.album {
            out.push_str(" from ");
            out.push_str(&album.name);
        }
        out
    }
}

impl fmt::Display for CatalogItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.chat_string(), self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> CatalogItem {
        CatalogItem::new(CatalogId::new("abc"), "Clair de Lune", "spotify:track:abc")
            .with_artist(NamedRef::new("Claude Debussy", "spotify:artist:deb"))
            .with_album(NamedRef::new("Suite bergamasque", "spotify:album:sb"))
    }

    #[test]
    fn test_chat_string() {
        assert_eq!(
            sample().chat_string(),
            "Clair de Lune by Claude Debussy from Suite bergamasque"
        );
    }

    #[test]
    fn test_chat_string_without_credits() {
        let item = CatalogItem::new(CatalogId::new("x"), "Untitled", "spotify:track:x");
        assert_eq!(item.chat_string(), "Untitled");
    }

    #[test]
    fn test_display_includes_uri() {
        assert!(sample().to_string().ends_with("(spotify:track:abc)"));
    }

    #[test]
    fn test_hydration() {
        let item = sample();
        assert!(!item.is_hydrated());

        let mut attrs = Map::new();
        attrs.insert("energy".to_string(), json!(0.5));
        let item = item.with_attributes(attrs);
        assert!(item.is_hydrated());
    }

    #[test]
    fn test_item_json_round_trip() {
        let mut item = sample();
        item.position = Some(IndexPosition::new(3));
        let json = serde_json::to_string(&item).unwrap();
        let back: CatalogItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }
}
