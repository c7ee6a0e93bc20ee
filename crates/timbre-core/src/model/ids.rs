use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier issued by the external catalog for a track.
///
/// Always holds the bare ID; URI and URL forms are stripped by
/// [`CatalogId::parse`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogId(String);

impl CatalogId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse a bare ID, a `scheme:type:id` URI, or a catalog web URL.
    ///
    /// `spotify:track:4uLU6hMCjMI75M1A2tKUQC`,
    /// `https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=abc` and
    /// `4uLU6hMCjMI75M1A2tKUQC` all yield the same ID.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        if let Some(rest) = raw
            .strip_prefix("https://")
            .or_else(|| raw.strip_prefix("http://"))
        {
            let path = rest.split(['?', '#']).next().unwrap_or(rest);
            let last = path
                .rsplit('/')
                .find(|segment| !segment.is_empty())
                .unwrap_or_default();
            return Self(last.to_string());
        }

        let bare = raw.rsplit(':').next().unwrap_or(raw);
        Self(bare.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CatalogId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CatalogId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Dense position of an item inside one built vector index.
///
/// Positions are assigned sequentially from 0 during ingestion and are
/// only meaningful together with the index and bridge of the same run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct IndexPosition(u32);

impl IndexPosition {
    #[must_use]
    pub const fn new(position: u32) -> Self {
        Self(position)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// The position following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for IndexPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for IndexPosition {
    fn from(position: u32) -> Self {
        Self(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_id() {
        assert_eq!(CatalogId::parse("4uLU6hMCjMI75M1A2tKUQC").as_str(), "4uLU6hMCjMI75M1A2tKUQC");
    }

    #[test]
    fn test_parse_uri() {
        let id = CatalogId::parse("spotify:track:4uLU6hMCjMI75M1A2tKUQC");
        assert_eq!(id.as_str(), "4uLU6hMCjMI75M1A2tKUQC");
    }

    #[test]
    fn test_parse_url() {
        let id = CatalogId::parse("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=abc123");
        assert_eq!(id.as_str(), "4uLU6hMCjMI75M1A2tKUQC");

        let trailing = CatalogId::parse("https://open.spotify.com/track/abc/");
        assert_eq!(trailing.as_str(), "abc");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(CatalogId::parse("  spotify:track:xyz \n").as_str(), "xyz");
    }

    #[test]
    fn test_position_next() {
        let position = IndexPosition::new(41);
        assert_eq!(position.next(), IndexPosition::new(42));
        assert_eq!(position.to_string(), "41");
    }

    #[test]
    fn test_position_serializes_as_integer() {
        let json = serde_json::to_string(&IndexPosition::new(7)).unwrap();
        assert_eq!(json, "7");
    }
}
