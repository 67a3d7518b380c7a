use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::feed::RemoteArticle;
use crate::identity::identity_key;

// ============================================================================
// Error Types
// ============================================================================

/// Failures reading or writing the favorites database.
///
/// Deleting an id that is not stored is not an error and never produces one
/// of these.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Another process holds the database lock
    #[error("Another instance of headline appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl PersistenceError {
    /// Classify a failure while opening the database. A lock at this point
    /// means another process owns the file; later busy errors are `Other`.
    pub(crate) fn from_open(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return PersistenceError::InstanceLocked;
        }
        PersistenceError::Other(err)
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) all surface
/// as one of these messages.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Favorite Record
// ============================================================================

/// Row type for favorites queries (used by sqlx FromRow).
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FavoriteDbRow {
    pub id: String,
    pub title: String,
    pub content: Option<String>,
    pub published_date: Option<i64>,
    pub url: String,
    pub author: Option<String>,
    pub url_to_image: Option<String>,
    pub popularity: Option<i64>,
}

impl FavoriteDbRow {
    pub(crate) fn into_record(self) -> FavoriteRecord {
        FavoriteRecord {
            id: self.id,
            title: self.title,
            content: self.content,
            published_date: self
                .published_date
                .and_then(DateTime::from_timestamp_millis),
            url: self.url,
            author: self.author,
            image_url: self.url_to_image,
            popularity: self.popularity,
        }
    }
}

/// Persisted snapshot of a favorited article.
///
/// Replaced wholesale whenever the same article is favorited again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteRecord {
    pub id: String,
    pub title: String,
    pub content: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub url: String,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub popularity: Option<i64>,
}

impl FavoriteRecord {
    /// Rebuild an article for rendering and toggling from the favorites list.
    ///
    /// The record does not keep the source or description, so the source is
    /// reported as unknown and the content doubles as the description.
    pub fn to_article(&self) -> RemoteArticle {
        RemoteArticle {
            source_name: "Unknown Source".to_string(),
            author: self.author.clone(),
            title: if self.title.is_empty() {
                "Untitled".to_string()
            } else {
                self.title.clone()
            },
            description: self.content.clone(),
            url: self.url.clone(),
            image_url: self.image_url.clone(),
            published_at: self.published_date.unwrap_or_else(Utc::now),
            content: self.content.clone(),
            popularity: self.popularity,
        }
    }
}

impl From<&RemoteArticle> for FavoriteRecord {
    fn from(article: &RemoteArticle) -> Self {
        Self {
            id: article.id().to_string(),
            title: article.title.clone(),
            content: article.content.clone(),
            published_date: Some(article.published_at),
            url: article.url.clone(),
            author: article.author.clone(),
            image_url: article.image_url.clone(),
            popularity: article.popularity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn article() -> RemoteArticle {
        RemoteArticle {
            source_name: "Wire".to_string(),
            author: Some("A. Writer".to_string()),
            title: "Title".to_string(),
            description: Some("Desc".to_string()),
            url: "https://news.example/a".to_string(),
            image_url: None,
            published_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            content: Some("Body".to_string()),
            popularity: Some(42),
        }
    }

    #[test]
    fn test_snapshot_keeps_identity_and_popularity() {
        let record = FavoriteRecord::from(&article());
        assert_eq!(record.id, "https://news.example/a");
        assert_eq!(record.url, record.id);
        assert_eq!(record.popularity, Some(42));
        assert_eq!(record.published_date, Some(article().published_at));
    }

    #[test]
    fn test_to_article_fills_missing_fields() {
        let mut record = FavoriteRecord::from(&article());
        record.title = String::new();
        let rebuilt = record.to_article();
        assert_eq!(rebuilt.title, "Untitled");
        assert_eq!(rebuilt.source_name, "Unknown Source");
        assert_eq!(rebuilt.description.as_deref(), Some("Body"));
        assert_eq!(rebuilt.id(), record.id);
    }

    #[test]
    fn test_row_conversion_restores_timestamp() {
        let row = FavoriteDbRow {
            id: "u".to_string(),
            title: "t".to_string(),
            content: None,
            published_date: Some(1_704_164_645_000),
            url: "u".to_string(),
            author: None,
            url_to_image: Some("img".to_string()),
            popularity: None,
        };
        let record = row.into_record();
        assert_eq!(record.published_date, Some(article().published_at));
        assert_eq!(record.image_url.as_deref(), Some("img"));
    }

    #[test]
    fn test_lock_maps_to_instance_locked_only_at_open() {
        let busy = || sqlx::Error::Protocol("database is locked".to_string());
        assert!(matches!(
            PersistenceError::from_open(busy()),
            PersistenceError::InstanceLocked
        ));
        assert!(matches!(PersistenceError::from(busy()), PersistenceError::Other(_)));
    }

    #[test]
    fn test_row_conversion_keeps_milliseconds() {
        let row = FavoriteDbRow {
            id: "u".to_string(),
            title: "t".to_string(),
            content: None,
            published_date: Some(1_704_110_400_750),
            url: "u".to_string(),
            author: None,
            url_to_image: None,
            popularity: None,
        };
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
            + chrono::Duration::milliseconds(750);
        assert_eq!(row.into_record().published_date, Some(expected));
    }

    #[test]
    fn test_lock_messages_detected() {
        assert!(is_lock_message("error returned from database: database is locked"));
        assert!(is_lock_message("SQLITE_BUSY"));
        assert!(!is_lock_message("no such table: favorites"));
    }
}
