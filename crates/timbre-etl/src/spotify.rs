//! Spotify Web API client.
//!
//! Implements [`CatalogSource`] against the saved-tracks, audio-features
//! and tracks endpoints, plus the public oEmbed endpoint for player HTML.
//! Every request goes through the client's [`RateLimiter`] and is retried
//! with exponential backoff while the error is transient (429, 5xx).

use std::time::Duration;

use async_trait::async_trait;
use backon::Retryable;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use timbre_core::{Attributes, CatalogId, CatalogItem, NamedRef};

use crate::error::{SourceError, SourceResult};
use crate::resilience::{retry_policy, RateLimiter};
use crate::source::{CatalogSource, SavedPage};

const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";
const SPOTIFY_OEMBED: &str = "https://open.spotify.com/oembed";
const SOURCE_NAME: &str = "Spotify";

/// Most IDs the audio-features endpoint accepts per request.
pub const MAX_FEATURE_IDS: usize = 100;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SavedTracksPage {
    items: Vec<SavedTrack>,
}

#[derive(Debug, Deserialize)]
struct SavedTrack {
    track: Option<SpotifyTrack>,
}

impl SavedTracksPage {
    fn into_page(self) -> SavedPage {
        let raw_len = self.items.len();
        let items = self
            .items
            .into_iter()
            .filter_map(|saved| saved.track.and_then(SpotifyTrack::into_item))
            .collect();
        SavedPage::new(items, raw_len)
    }
}

#[derive(Debug, Deserialize)]
struct AudioFeaturesResponse {
    audio_features: Vec<Option<Attributes>>,
}

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    html: Option<String>,
}

/// A track object as returned by the Web API.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrack {
    /// `None` for local files added to the library.
    pub id: Option<String>,
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
    #[serde(default)]
    pub artists: Vec<SpotifyRef>,
    pub album: Option<SpotifyRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalUrls {
    pub spotify: Option<String>,
}

/// Name and URI of an artist or album.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyRef {
    pub name: String,
    pub uri: String,
}

impl SpotifyTrack {
    /// Convert to a catalog item; local files without an ID yield `None`.
    pub fn into_item(self) -> Option<CatalogItem> {
        let id = self.id?;
        let mut item = CatalogItem::new(CatalogId::new(id), self.name, self.uri);
        if let Some(url) = self.external_urls.spotify {
            item = item.with_url(url);
        }
        if let Some(artist) = self.artists.into_iter().next() {
            item = item.with_artist(NamedRef::new(artist.name, artist.uri));
        }
        if let Some(album) = self.album {
            item = item.with_album(NamedRef::new(album.name, album.uri));
        }
        Some(item)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Spotify Web API client.
///
/// Wraps a [`reqwest::Client`] with a 30-second timeout and a bearer
/// token obtained elsewhere (the OAuth flow is not handled here).
#[derive(Debug, Clone)]
pub struct SpotifyClient {
    http: Client,
    token: String,
    api_base: String,
    oembed_url: String,
    rate_limiter: RateLimiter,
}

impl SpotifyClient {
    /// Create a client authorized with `token`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(token: impl Into<String>) -> SourceResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("timbre/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            token: token.into(),
            api_base: SPOTIFY_API_BASE.to_string(),
            oembed_url: SPOTIFY_OEMBED.to_string(),
            rate_limiter: RateLimiter::new(10),
        })
    }

    /// Point the client at a different API root, e.g. a local mock.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// GET `path` under the API root, retrying transient failures.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> SourceResult<T> {
        let url = format!("{}{path}", self.api_base);
        let url = url.as_str();
        let fetch = || async move { self.get_once(url, query, true).await };

        fetch
            .retry(retry_policy())
            .when(SourceError::is_transient)
            .notify(|err, delay| {
                log::warn!("{SOURCE_NAME} request to {path} failed ({err}); retrying in {delay:?}");
            })
            .await
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        authorized: bool,
    ) -> SourceResult<T> {
        self.rate_limiter.acquire().await;

        let mut request = self.http.get(url).query(query);
        if authorized {
            request = request.bearer_auth(&self.token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, url, &body));
        }

        response.json::<T>().await.map_err(|e| SourceError::Parse {
            source_name: SOURCE_NAME.to_string(),
            message: e.to_string(),
        })
    }
}

fn status_error(status: StatusCode, url: &str, body: &str) -> SourceError {
    let source_name = SOURCE_NAME.to_string();
    match status {
        StatusCode::UNAUTHORIZED => SourceError::Unauthorized { source_name },
        StatusCode::NOT_FOUND => SourceError::NotFound {
            entity: url.to_string(),
            source_name,
        },
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited { source_name },
        _ => SourceError::Http {
            source_name,
            status: status.as_u16(),
            message: format!("{status} for {url}: {body}"),
        },
    }
}

#[async_trait]
impl CatalogSource for SpotifyClient {
    async fn saved_items(&self, offset: usize, limit: usize) -> SourceResult<SavedPage> {
        let page: SavedTracksPage = self
            .get_json(
                "/me/tracks",
                &[("offset", offset.to_string()), ("limit", limit.to_string())],
            )
            .await?;

        Ok(page.into_page())
    }

    async fn audio_features(&self, ids: &[CatalogId]) -> SourceResult<Vec<Option<Attributes>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids
            .iter()
            .map(CatalogId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let response: AudioFeaturesResponse =
            self.get_json("/audio-features", &[("ids", joined)]).await?;

        let mut features = response.audio_features;
        features.resize(ids.len(), None);
        Ok(features)
    }

    async fn item(&self, id: &CatalogId) -> SourceResult<CatalogItem> {
        let track: SpotifyTrack = self.get_json(&format!("/tracks/{id}"), &[]).await?;
        track.into_item().ok_or_else(|| SourceError::NotFound {
            entity: format!("track {id}"),
            source_name: SOURCE_NAME.to_string(),
        })
    }

    async fn embed_html(&self, item: &CatalogItem) -> SourceResult<Option<String>> {
        let Some(url) = &item.url else {
            return Ok(None);
        };
        let response: OEmbedResponse = self
            .get_once(&self.oembed_url, &[("url", url.clone())], false)
            .await?;
        Ok(response.html)
    }
}
