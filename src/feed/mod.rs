//! Remote news feed access.
//!
//! The feed is an external collaborator: this module only builds the query,
//! performs one HTTP request per fetch, and turns the JSON response into
//! [`RemoteArticle`]s or a classified [`FeedError`].
//!
//! - [`types`] - wire format and the decoded article type
//! - [`client`] - HTTP transport with timeout and body size limit

mod client;
mod types;

pub use client::{FeedClient, FeedError, FeedRequest};
pub use types::{FeedPage, NewsResponse, RemoteArticle, WireArticle, WireSource};
