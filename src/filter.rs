//! Text, date and sort predicates shared by the remote feed and the favorites list.
//!
//! Everything here is pure: functions take owned lists and return narrowed or
//! reordered lists. The pipeline is always text filter, then date filter, then
//! sort, so sorting only ever reorders what survived the filters.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::feed::RemoteArticle;
use crate::identity::{title_matches, CalendarDay};
use crate::storage::FavoriteRecord;

// ============================================================================
// Article View
// ============================================================================

/// The minimal view of an article the filters need.
pub trait ArticleView {
    fn title(&self) -> &str;
    fn published_at(&self) -> Option<DateTime<Utc>>;
    fn popularity(&self) -> Option<i64>;
}

impl<T: ArticleView + ?Sized> ArticleView for &T {
    fn title(&self) -> &str {
        (**self).title()
    }

    fn published_at(&self) -> Option<DateTime<Utc>> {
        (**self).published_at()
    }

    fn popularity(&self) -> Option<i64> {
        (**self).popularity()
    }
}

impl ArticleView for RemoteArticle {
    fn title(&self) -> &str {
        &self.title
    }

    fn published_at(&self) -> Option<DateTime<Utc>> {
        Some(self.published_at)
    }

    fn popularity(&self) -> Option<i64> {
        self.popularity
    }
}

impl ArticleView for FavoriteRecord {
    fn title(&self) -> &str {
        &self.title
    }

    fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_date
    }

    fn popularity(&self) -> Option<i64> {
        self.popularity
    }
}

// ============================================================================
// Sort Key
// ============================================================================

#[derive(Debug, Error)]
#[error("Unknown sort key '{0}': expected none, popularity or published-at")]
pub struct SortKeyParseError(String);

/// Ordering applied after filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SortKey {
    /// Keep input order.
    #[default]
    None,
    /// Most popular first; articles without a score last.
    Popularity,
    /// Newest first.
    PublishedAt,
}

impl SortKey {
    pub const ALL: [SortKey; 3] = [SortKey::None, SortKey::Popularity, SortKey::PublishedAt];

    /// Value of the remote `sortBy` parameter, `None` when it is omitted.
    pub fn remote_param(&self) -> Option<&'static str> {
        match self {
            SortKey::None => None,
            SortKey::Popularity => Some("popularity"),
            SortKey::PublishedAt => Some("publishedAt"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::None => "none",
            SortKey::Popularity => "popularity",
            SortKey::PublishedAt => "published-at",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = SortKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "none" => Ok(SortKey::None),
            "popularity" => Ok(SortKey::Popularity),
            "publishedat" | "publishat" | "published" => Ok(SortKey::PublishedAt),
            _ => Err(SortKeyParseError(s.to_string())),
        }
    }
}

impl TryFrom<String> for SortKey {
    type Error = SortKeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SortKey> for String {
    fn from(key: SortKey) -> Self {
        key.as_str().to_string()
    }
}

// ============================================================================
// Filter Criteria
// ============================================================================

/// One complete filter/sort selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Local title search; empty disables it.
    pub query: String,
    /// Single-day filter; `None` disables it.
    pub day: Option<CalendarDay>,
    pub sort: SortKey,
}

impl FilterCriteria {
    pub fn new(query: impl Into<String>, day: Option<CalendarDay>, sort: SortKey) -> Self {
        Self {
            query: query.into(),
            day,
            sort,
        }
    }

    /// Text filter, then date filter, then sort.
    pub fn apply<T: ArticleView>(&self, items: Vec<T>) -> Vec<T> {
        apply(items, self)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

pub fn filter_by_text<T: ArticleView>(items: Vec<T>, query: &str) -> Vec<T> {
    if query.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| title_matches(item.title(), query))
        .collect()
}

/// Keep items published on `day`; items without a timestamp never match.
pub fn filter_by_day<T: ArticleView>(items: Vec<T>, day: Option<CalendarDay>) -> Vec<T> {
    let Some(day) = day else {
        return items;
    };
    items
        .into_iter()
        .filter(|item| item.published_at().is_some_and(|at| day.contains(at)))
        .collect()
}

/// Stable sort by `key`, descending; missing values go last.
pub fn sort_by_key<T: ArticleView>(items: &mut [T], key: SortKey) {
    match key {
        SortKey::None => {}
        SortKey::Popularity => {
            items.sort_by(|a, b| descending_present_first(a.popularity(), b.popularity()))
        }
        SortKey::PublishedAt => {
            items.sort_by(|a, b| descending_present_first(a.published_at(), b.published_at()))
        }
    }
}

fn descending_present_first<V: Ord>(a: Option<V>, b: Option<V>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn apply<T: ArticleView>(items: Vec<T>, criteria: &FilterCriteria) -> Vec<T> {
    let items = filter_by_text(items, &criteria.query);
    let mut items = filter_by_day(items, criteria.day);
    sort_by_key(&mut items, criteria.sort);
    items
}
