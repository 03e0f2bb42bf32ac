//! SQLite persistence for processed articles and per-bucket statistics.
//!
//! The articles table is the dedup ledger: UNIQUE(source, article_id) is the
//! authoritative guard against double-processing. Statistics are maintained
//! in the same transaction as each insert, so the two tables cannot drift.

mod articles;
mod schema;
mod stats;
mod types;

pub use schema::Database;
pub use types::{ArticleRecord, CategoryStats, NewArticle, StorageError};
