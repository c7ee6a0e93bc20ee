use serde::{Deserialize, Serialize};

/// A structured event handed back to the intent router, which forwards
/// it to the chat transport unchanged.
///
/// Serializes as `{"type": "message", "content": "..."}` or
/// `{"type": "embed", "content": "<iframe ...>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum ResponseEvent {
    /// Plain chat text.
    Message(String),
    /// Embeddable HTML player for a track.
    Embed(String),
}

impl ResponseEvent {
    #[must_use]
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }

    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::Message(content) | Self::Embed(content) => content,
        }
    }
}
