//! Favorites persistence and reconciliation for a remote news feed.
//!
//! A [`session::FeedSession`] holds the fetched article list and the active
//! selection; a [`storage::Database`] holds the favorites; a
//! [`overlay::FavoriteOverlay`] keeps the per-article flags of the former in
//! step with the latter.

pub mod config;
pub mod feed;
pub mod filter;
pub mod identity;
pub mod overlay;
pub mod session;
pub mod storage;
pub mod util;
