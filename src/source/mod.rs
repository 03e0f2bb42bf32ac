//! Content-source clients and the normalized article model they produce.

pub mod qiita;
pub mod zenn;

pub use qiita::QiitaClient;
pub use zenn::{topic_feed_url, ZennClient};

use chrono::{DateTime, Utc};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors from fetching a content source.
///
/// A whole-source failure is reported to the caller, which logs it and
/// continues with the remaining sources — a dead API never aborts a run.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the per-call timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body could not be decoded into articles
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

// ============================================================================
// Data Structures
// ============================================================================

/// Where an article came from. Article identifiers are only unique within
/// a source, so the (source, article_id) pair is the dedup identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Qiita,
    Zenn,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Qiita => "qiita",
            Source::Zenn => "zenn",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fetched article, normalized across sources. Read-only input to the
/// pipeline; the persisted form is [`crate::storage::NewArticle`].
#[derive(Debug, Clone)]
pub struct Article {
    pub source: Source,
    /// Unique within `source`.
    pub article_id: String,
    pub url: String,
    pub title: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    /// Ordered as the source reported them.
    pub tags: Vec<String>,
    pub likes_count: i64,
    pub body: String,
}
