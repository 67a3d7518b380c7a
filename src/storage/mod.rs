mod favorites;
mod schema;
mod types;

pub use schema::Database;
pub use types::{FavoriteRecord, PersistenceError};
