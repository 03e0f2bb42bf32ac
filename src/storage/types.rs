use chrono::{DateTime, Utc};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage-layer errors.
///
/// `Duplicate` is raised by the UNIQUE(source, article_id) constraint — the
/// store, not the caller's pre-check, is the correctness mechanism against
/// double-processing, so a lost insert race surfaces here and is treated as
/// success-equivalent upstream.
#[derive(Debug, Error)]
pub enum StorageError {
    // Field is named `origin` rather than `source` because thiserror treats
    // a `source` field as the error's cause chain.
    #[error("Article already recorded: {origin}/{article_id}")]
    Duplicate { origin: String, article_id: String },

    #[error("Database migration failed: {0}")]
    Migration(String),

    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StorageError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StorageError::Duplicate { .. })
    }
}

/// Whether a sqlx error is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

// ============================================================================
// Data Structures
// ============================================================================

/// Input to `Database::insert_article`: a classified article together with
/// the path its rendered document was written to.
///
/// The subcategory is `None` for the fallback category; at the SQL layer it
/// is stored as the empty string because SQLite UNIQUE indexes treat NULLs
/// as distinct rows, which would break the stats upsert key.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub source: String,
    pub article_id: String,
    pub url: String,
    pub title: String,
    pub author: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub file_path: String,
    pub tags: Vec<String>,
    pub likes_count: i64,
    pub published_at: DateTime<Utc>,
}

/// A persisted article row. Created exactly once per (source, article_id);
/// never mutated or deleted by the pipeline.
#[derive(Debug, Clone)]
pub struct ArticleRecord {
    pub id: i64,
    pub source: String,
    pub article_id: String,
    pub url: String,
    pub title: String,
    pub author: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub file_path: String,
    pub tags: Vec<String>,
    pub likes_count: i64,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate row for a (category, subcategory) bucket. Kept transactionally
/// consistent with the articles table: `article_count` always equals the
/// number of article rows in the bucket, `total_likes` their likes sum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryStats {
    pub category: String,
    pub subcategory: Option<String>,
    pub article_count: i64,
    pub total_likes: i64,
    pub last_updated: DateTime<Utc>,
}

// ============================================================================
// Row Types
// ============================================================================

/// Internal row type for article queries; converts JSON tags and integer
/// timestamps into the public record shape.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArticleDbRow {
    pub id: i64,
    pub source: String,
    pub article_id: String,
    pub url: String,
    pub title: String,
    pub author: String,
    pub category: String,
    pub subcategory: String,
    pub file_path: String,
    pub tags: String,
    pub likes_count: i64,
    pub published_at: i64,
    pub created_at: i64,
}

impl ArticleDbRow {
    pub(crate) fn into_record(self) -> ArticleRecord {
        ArticleRecord {
            id: self.id,
            source: self.source,
            article_id: self.article_id,
            url: self.url,
            title: self.title,
            author: self.author,
            category: self.category,
            subcategory: sql_to_subcategory(self.subcategory),
            file_path: self.file_path,
            tags: serde_json::from_str(&self.tags).unwrap_or_default(),
            likes_count: self.likes_count,
            published_at: timestamp_to_datetime(self.published_at),
            created_at: timestamp_to_datetime(self.created_at),
        }
    }
}

pub(crate) fn subcategory_to_sql(subcategory: Option<&str>) -> &str {
    subcategory.unwrap_or("")
}

pub(crate) fn sql_to_subcategory(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

pub(crate) fn timestamp_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}
