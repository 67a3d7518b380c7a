//! In-memory state of the feed view: fetched articles, active selection,
//! favorite flags, and the token that keeps stale fetches out.
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::feed::{FeedClient, FeedError, FeedPage, FeedRequest, RemoteArticle};
use crate::filter::{ArticleView, FilterCriteria, SortKey};
use crate::identity::CalendarDay;
use crate::overlay::FavoriteOverlay;
use crate::storage::{Database, PersistenceError};

#[derive(Debug, Error)]
pub enum SessionError {
    /// The id is not in the currently fetched list
    #[error("Article not in the current feed: {0}")]
    UnknownArticle(String),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Events from background fetch tasks
#[derive(Debug)]
pub enum SessionEvent {
    /// A fetch finished.
    ///
    /// Fields:
    /// - `generation`: Generation counter when the fetch was spawned
    /// - `result`: Decoded page or the classified failure
    FeedLoaded {
        generation: u64,
        result: Result<FeedPage, FeedError>,
    },
}

/// One article row as a view renders it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedRow<'a> {
    pub article: &'a RemoteArticle,
    pub favorited: bool,
}

impl ArticleView for FeedRow<'_> {
    fn title(&self) -> &str {
        &self.article.title
    }

    fn published_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        Some(self.article.published_at)
    }

    fn popularity(&self) -> Option<i64> {
        self.article.popularity
    }
}

pub struct FeedSession {
    /// Remote topic term, sent as `q`
    topic: String,
    /// Articles from the latest accepted fetch
    articles: Arc<Vec<RemoteArticle>>,
    overlay: FavoriteOverlay,
    criteria: FilterCriteria,
    /// Total reported by the feed for the latest accepted fetch
    pub total_results: Option<u64>,
    /// User-facing text of the last failed fetch, cleared on success
    pub last_error: Option<String>,
    /// Generation counter for fetches.
    ///
    /// Incremented for every fetch issued. Results carrying an older
    /// generation are dropped, so a slow response for an old selection can
    /// never overwrite a newer one.
    fetch_generation: u64,
    /// Handle to the in-flight fetch task, aborted when a newer one starts.
    fetch_handle: Option<tokio::task::JoinHandle<()>>,
}

impl FeedSession {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            articles: Arc::new(Vec::new()),
            overlay: FavoriteOverlay::default(),
            criteria: FilterCriteria::default(),
            total_results: None,
            last_error: None,
            fetch_generation: 0,
            fetch_handle: None,
        }
    }

    pub fn with_criteria(mut self, criteria: FilterCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn articles(&self) -> &[RemoteArticle] {
        &self.articles
    }

    pub fn overlay(&self) -> &FavoriteOverlay {
        &self.overlay
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn generation(&self) -> u64 {
        self.fetch_generation
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Local title search; never changes what is fetched.
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.criteria.query = query.into();
    }

    /// Returns `true` when the remote parameters changed and a fetch is due.
    pub fn set_day(&mut self, day: Option<CalendarDay>) -> bool {
        let changed = self.criteria.day != day;
        self.criteria.day = day;
        changed
    }

    /// Returns `true` when the remote parameters changed and a fetch is due.
    pub fn set_sort(&mut self, sort: SortKey) -> bool {
        let changed = self.criteria.sort != sort;
        self.criteria.sort = sort;
        changed
    }

    pub fn feed_request(&self) -> FeedRequest {
        FeedRequest {
            topic: self.topic.clone(),
            from: self.criteria.day,
            sort: self.criteria.sort,
        }
    }

    // ========================================================================
    // Fetching
    // ========================================================================

    /// Issue a new request token and the request it belongs to.
    pub fn begin_fetch(&mut self) -> (u64, FeedRequest) {
        self.fetch_generation = self.fetch_generation.wrapping_add(1);
        (self.fetch_generation, self.feed_request())
    }

    /// Spawn a background fetch, superseding any fetch still in flight.
    ///
    /// The result arrives as [`SessionEvent::FeedLoaded`] on `event_tx`.
    pub fn spawn_fetch(
        &mut self,
        client: &FeedClient,
        event_tx: &mpsc::Sender<SessionEvent>,
    ) -> u64 {
        self.abort_in_flight();

        let (generation, request) = self.begin_fetch();
        let client = client.clone();
        let tx = event_tx.clone();

        tracing::debug!(generation, topic = %request.topic, "Spawning fetch task");

        self.fetch_handle = Some(tokio::spawn(async move {
            let result = client.fetch(&request).await;
            if let Err(e) = tx.send(SessionEvent::FeedLoaded { generation, result }).await {
                tracing::warn!(error = %e, "Failed to send fetch result (receiver dropped)");
            }
        }));

        generation
    }

    fn abort_in_flight(&mut self) {
        if let Some(handle) = self.fetch_handle.take() {
            handle.abort();
            tracing::debug!("Aborted previous fetch task");
        }
    }

    /// Accept the outcome of a fetch.
    ///
    /// Returns `Ok(false)` for a stale generation (nothing changes) and
    /// `Ok(true)` when the list was replaced. A failed fetch leaves the
    /// articles and flags as they were and records its message.
    pub fn apply_fetch(
        &mut self,
        generation: u64,
        result: Result<FeedPage, FeedError>,
        favorited_ids: &HashSet<String>,
    ) -> Result<bool, FeedError> {
        if generation != self.fetch_generation {
            tracing::debug!(
                expected = self.fetch_generation,
                got = generation,
                "Ignoring stale fetch result (generation mismatch)"
            );
            return Ok(false);
        }
        self.fetch_handle = None;

        match result {
            Ok(page) => {
                self.total_results = page.total_results;
                self.articles = Arc::new(page.articles);
                self.overlay = FavoriteOverlay::build(self.articles.iter(), favorited_ids);
                self.last_error = None;
                tracing::debug!(generation, count = self.articles.len(), "Feed applied");
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(generation, error = %e, "Fetch failed, keeping current feed");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Fetch in the foreground: cancel any background fetch, issue a token,
    /// await the client, apply.
    pub async fn fetch_now(
        &mut self,
        client: &FeedClient,
        store: &Database,
    ) -> Result<bool, SessionError> {
        self.abort_in_flight();
        let (generation, request) = self.begin_fetch();
        let result = client.fetch(&request).await;
        let favorited_ids = store.favorite_ids().await?;
        Ok(self.apply_fetch(generation, result, &favorited_ids)?)
    }

    // ========================================================================
    // Favorites
    // ========================================================================

    /// Rebuild every flag from the store (e.g. after returning from the
    /// favorites list, where items may have been removed).
    pub async fn refresh_favorites(&mut self, store: &Database) -> Result<(), PersistenceError> {
        let favorited_ids = store.favorite_ids().await?;
        self.overlay = FavoriteOverlay::build(self.articles.iter(), &favorited_ids);
        Ok(())
    }

    /// Toggle the favorite state of the article with `id`.
    pub async fn toggle_favorite(
        &mut self,
        store: &Database,
        id: &str,
    ) -> Result<bool, SessionError> {
        let articles = Arc::clone(&self.articles);
        let article = articles
            .iter()
            .find(|a| a.id() == id)
            .ok_or_else(|| SessionError::UnknownArticle(id.to_string()))?;
        let current = self.overlay.is_favorited(id);
        Ok(self.overlay.toggle(store, article, current).await?)
    }

    // ========================================================================
    // View
    // ========================================================================

    /// Rows to render: flagged, filtered and sorted by the active selection.
    pub fn visible(&self) -> Vec<FeedRow<'_>> {
        let rows: Vec<FeedRow<'_>> = self
            .articles
            .iter()
            .map(|article| FeedRow {
                article,
                favorited: self.overlay.is_favorited(article.id()),
            })
            .collect();
        self.criteria.apply(rows)
    }
}

impl Drop for FeedSession {
    fn drop(&mut self) {
        self.abort_in_flight();
    }
}
