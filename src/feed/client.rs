use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::types::{FeedPage, NewsResponse, RemoteArticle};
use crate::filter::SortKey;
use crate::identity::CalendarDay;

const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while fetching the remote feed.
///
/// None of these are retried automatically; the caller decides what to show.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// HTTP response with a non-2xx status and no usable error payload
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Body did not match the expected response shape
    #[error("Decoding error: {0}")]
    Decode(#[from] serde_json::Error),
    /// The feed answered with `status != "ok"`
    #[error("{message}")]
    Application {
        code: Option<String>,
        message: String,
    },
    /// Base URL could not be joined with the endpoint path
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

// ============================================================================
// Request
// ============================================================================

/// Query for one fetch of the `/everything` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRequest {
    /// Remote topic term (`q`)
    pub topic: String,
    /// Earliest publish day (`from`), only sent when a day is selected
    pub from: Option<CalendarDay>,
    /// Remote ordering (`sortBy`), omitted for [`SortKey::None`]
    pub sort: SortKey,
}

impl FeedRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            from: None,
            sort: SortKey::None,
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("q", self.topic.clone())];
        if let Some(day) = self.from {
            pairs.push(("from", day.to_string()));
        }
        if let Some(sort_by) = self.sort.remote_param() {
            pairs.push(("sortBy", sort_by.to_string()));
        }
        pairs
    }
}

// ============================================================================
// Client
// ============================================================================

/// HTTP adapter for the remote news feed.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct FeedClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl FeedClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Result<Self, FeedError> {
        // Url::join replaces the last path segment unless the base ends in '/'
        let mut base = base_url.trim_end_matches('/').to_string();
        base.push('/');
        Ok(Self {
            http,
            base_url: Url::parse(&base)?,
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<SecretString>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full endpoint URL for `request`, query string included.
    pub fn endpoint(&self, request: &FeedRequest) -> Result<Url, FeedError> {
        let mut url = self.base_url.join("everything")?;
        url.query_pairs_mut().extend_pairs(request.query_pairs());
        Ok(url)
    }

    /// Fetch and decode one page of articles.
    ///
    /// # Errors
    ///
    /// - [`FeedError::Network`] / [`FeedError::Timeout`] for transport failures
    /// - [`FeedError::Application`] when the feed reports `status != "ok"`,
    ///   including non-2xx responses that carry an error payload
    /// - [`FeedError::HttpStatus`] for other non-2xx responses
    /// - [`FeedError::Decode`] when the body does not match the response shape
    pub async fn fetch(&self, request: &FeedRequest) -> Result<FeedPage, FeedError> {
        let url = self.endpoint(request)?;
        tracing::debug!(topic = %request.topic, from = ?request.from, sort = %request.sort, "Fetching feed");

        let mut builder = self.http.get(url).header("Accept", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = tokio::time::timeout(self.timeout, builder.send())
            .await
            .map_err(|_| FeedError::Timeout)?
            .map_err(FeedError::Network)?;

        let status = response.status();
        let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;

        if !status.is_success() {
            // Error payloads still follow the response shape; prefer their message
            return match serde_json::from_slice::<NewsResponse>(&bytes) {
                Ok(body) if !body.is_ok() => Err(application_error(body)),
                _ => {
                    tracing::warn!(status = %status, "Feed request failed");
                    Err(FeedError::HttpStatus(status.as_u16()))
                }
            };
        }

        let body: NewsResponse = serde_json::from_slice(&bytes).map_err(|e| {
            tracing::warn!(error = %e, "Feed response did not match expected shape");
            FeedError::Decode(e)
        })?;

        if !body.is_ok() {
            return Err(application_error(body));
        }

        let page = FeedPage {
            total_results: body.total_results,
            articles: body.articles.into_iter().map(RemoteArticle::from).collect(),
        };
        tracing::info!(count = page.articles.len(), total = ?page.total_results, "Feed fetched");
        Ok(page)
    }
}

fn application_error(body: NewsResponse) -> FeedError {
    let message = body.message.unwrap_or_else(|| "Unknown error".to_string());
    tracing::warn!(code = ?body.code, message = %message, "Feed reported an error");
    FeedError::Application {
        code: body.code,
        message,
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FeedError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FeedError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FeedError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FeedError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
