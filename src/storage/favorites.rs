use std::collections::HashSet;

use super::schema::Database;
use super::types::{FavoriteDbRow, FavoriteRecord, PersistenceError};
use crate::feed::RemoteArticle;
use crate::filter::{self, FilterCriteria, SortKey};
use crate::identity::CalendarDay;

impl Database {
    // ========================================================================
    // Favorite Writes
    // ========================================================================

    /// Favorite an article, replacing any earlier snapshot with the same id.
    ///
    /// One `INSERT ... ON CONFLICT DO UPDATE` statement rewrites every column,
    /// so readers see either the old row or the new row, never a mix.
    pub async fn save(&self, article: &RemoteArticle) -> Result<(), PersistenceError> {
        let record = FavoriteRecord::from(article);
        let _guard = self.writer.lock().await;

        sqlx::query(
            r#"
            INSERT INTO favorites (id, title, content, published_date, url, author, url_to_image, popularity)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                published_date = excluded.published_date,
                url = excluded.url,
                author = excluded.author,
                url_to_image = excluded.url_to_image,
                popularity = excluded.popularity
        "#,
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(&record.content)
        .bind(record.published_date.map(|at| at.timestamp_millis()))
        .bind(&record.url)
        .bind(&record.author)
        .bind(&record.image_url)
        .bind(record.popularity)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(id = %record.id, error = %e, "Failed to save favorite");
            PersistenceError::Other(e)
        })?;

        tracing::debug!(id = %record.id, "Favorite saved");
        Ok(())
    }

    /// Remove a favorite. Unknown ids are a silent no-op.
    pub async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        let _guard = self.writer.lock().await;

        let result = sqlx::query("DELETE FROM favorites WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(id = %id, error = %e, "Failed to delete favorite");
                PersistenceError::Other(e)
            })?;

        tracing::debug!(id = %id, removed = result.rows_affected(), "Favorite deleted");
        Ok(())
    }

    // ========================================================================
    // Favorite Queries
    // ========================================================================

    /// All favorites. Row order is unspecified; sort with [`filter`] instead.
    pub async fn fetch_all(&self) -> Result<Vec<FavoriteRecord>, PersistenceError> {
        let rows = sqlx::query_as::<_, FavoriteDbRow>(
            r#"
            SELECT id, title, content, published_date, url, author, url_to_image, popularity
            FROM favorites
        "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(PersistenceError::Other)?;

        Ok(rows.into_iter().map(FavoriteDbRow::into_record).collect())
    }

    /// Favorites narrowed to `day` and ordered by `sort`, through the same
    /// filter pipeline the remote feed uses.
    pub async fn fetch_filtered(
        &self,
        day: Option<CalendarDay>,
        sort: SortKey,
    ) -> Result<Vec<FavoriteRecord>, PersistenceError> {
        let records = self.fetch_all().await?;
        let criteria = FilterCriteria::new("", day, sort);
        Ok(filter::apply(records, &criteria))
    }

    /// Snapshot of every favorited id, for building overlays.
    pub async fn favorite_ids(&self) -> Result<HashSet<String>, PersistenceError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT id FROM favorites")
            .fetch_all(&self.pool)
            .await
            .map_err(PersistenceError::Other)?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// The stored snapshot for `id`, if favorited.
    pub async fn get(&self, id: &str) -> Result<Option<FavoriteRecord>, PersistenceError> {
        let row = sqlx::query_as::<_, FavoriteDbRow>(
            r#"
            SELECT id, title, content, published_date, url, author, url_to_image, popularity
            FROM favorites
            WHERE id = ?
        "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(PersistenceError::Other)?;

        Ok(row.map(FavoriteDbRow::into_record))
    }

    pub async fn is_favorite(&self, id: &str) -> Result<bool, PersistenceError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM favorites WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(PersistenceError::Other)?;

        Ok(row.is_some())
    }
}
