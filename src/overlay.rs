//! Per-article "is favorited" flags for the articles currently on screen.
//!
//! The overlay is a projection of the favorites store onto one list of
//! remote articles. It is rebuilt from a fresh id snapshot whenever the list
//! or the store changes wholesale, and patched only through [`FavoriteOverlay::toggle`],
//! which writes through to the store and rolls back if the write fails.
use std::collections::{HashMap, HashSet};

use crate::feed::RemoteArticle;
use crate::storage::{Database, PersistenceError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavoriteOverlay {
    flags: HashMap<String, bool>,
}

impl FavoriteOverlay {
    /// One flag per article: `true` iff its id is in `favorited_ids`.
    pub fn build<'a, I>(articles: I, favorited_ids: &HashSet<String>) -> Self
    where
        I: IntoIterator<Item = &'a RemoteArticle>,
    {
        let flags = articles
            .into_iter()
            .map(|article| {
                let id = article.id();
                (id.to_string(), favorited_ids.contains(id))
            })
            .collect();
        Self { flags }
    }

    /// Flag for `id`; articles outside the overlay read as not favorited.
    pub fn is_favorited(&self, id: &str) -> bool {
        self.flags.get(id).copied().unwrap_or(false)
    }

    pub fn flags(&self) -> &HashMap<String, bool> {
        &self.flags
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Flip the flag of `article` from `current` and persist the change.
    ///
    /// The new flag is set before the store call; if the store call fails
    /// the flag goes back to `current` and the error is returned.
    pub async fn toggle(
        &mut self,
        store: &Database,
        article: &RemoteArticle,
        current: bool,
    ) -> Result<bool, PersistenceError> {
        let id = article.id().to_string();
        let next = !current;
        self.flags.insert(id.clone(), next);

        let result = if next {
            store.save(article).await
        } else {
            store.delete(&id).await
        };

        match result {
            Ok(()) => {
                tracing::debug!(id = %id, favorited = next, "Favorite toggled");
                Ok(next)
            }
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Favorite toggle failed, restoring flag");
                self.flags.insert(id, current);
                Err(e)
            }
        }
    }
}
