use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::identity::identity_key;

// ============================================================================
// Wire Types
// ============================================================================

/// Top-level response of the `/everything` endpoint.
///
/// Error payloads (`status = "error"`) carry `code`/`message` and no
/// `articles`, so the list defaults to empty.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsResponse {
    pub status: String,
    pub total_results: Option<u64>,
    #[serde(default)]
    pub articles: Vec<WireArticle>,
    pub code: Option<String>,
    pub message: Option<String>,
}

impl NewsResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireSource {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireArticle {
    pub source: WireSource,
    pub author: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub url_to_image: Option<String>,
    pub published_at: DateTime<Utc>,
    pub content: Option<String>,
    pub popularity: Option<i64>,
}

// ============================================================================
// Remote Article
// ============================================================================

/// An article as delivered by one fetch of the remote feed.
///
/// Immutable once built. Its identity is the URL, see [`RemoteArticle::id`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteArticle {
    pub source_name: String,
    pub author: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub content: Option<String>,
    pub popularity: Option<i64>,
}

impl RemoteArticle {
    pub fn id(&self) -> &str {
        identity_key(&self.url)
    }

    pub fn author_text(&self) -> &str {
        self.author.as_deref().unwrap_or("Unknown Author")
    }

    pub fn description_text(&self) -> &str {
        self.description
            .as_deref()
            .unwrap_or("No description available.")
    }
}

impl From<WireArticle> for RemoteArticle {
    fn from(wire: WireArticle) -> Self {
        Self {
            source_name: wire.source.name,
            author: wire.author,
            title: wire.title,
            description: wire.description,
            url: wire.url,
            image_url: wire.url_to_image,
            published_at: wire.published_at,
            content: wire.content,
            popularity: wire.popularity,
        }
    }
}

/// Decoded articles from one successful fetch.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub articles: Vec<RemoteArticle>,
    pub total_results: Option<u64>,
}
