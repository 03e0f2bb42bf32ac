//! Zenn RSS client. Zenn exposes no public JSON API for recent articles, so
//! the site-wide feed (and optional per-topic feeds) are parsed instead.
//! The feed carries no like counts; those are recorded as 0.

use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;

use super::{Article, Source, SourceError};

pub const DEFAULT_FEED_URL: &str = "https://zenn.dev/feed";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Feed URL for a Zenn topic (e.g. "rust" -> https://zenn.dev/topics/rust/feed).
pub fn topic_feed_url(topic: &str) -> String {
    format!("https://zenn.dev/topics/{topic}/feed")
}

// ============================================================================
// Client
// ============================================================================

pub struct ZennClient {
    client: reqwest::Client,
    feed_url: String,
}

impl ZennClient {
    pub fn new(client: reqwest::Client, feed_url: impl Into<String>) -> Self {
        Self {
            client,
            feed_url: feed_url.into(),
        }
    }

    /// Fetch recent articles from the feed, newest-first as the feed lists
    /// them, capped at `max_articles` and filtered to the last `days_back`
    /// days. Entries without a parsable article id or publish date are
    /// skipped with a warning rather than failing the whole feed.
    pub async fn fetch_recent(
        &self,
        days_back: u32,
        max_articles: usize,
    ) -> Result<Vec<Article>, SourceError> {
        let response = tokio::time::timeout(REQUEST_TIMEOUT, self.client.get(&self.feed_url).send())
            .await
            .map_err(|_| SourceError::Timeout)?
            .map_err(SourceError::Network)?;

        if !response.status().is_success() {
            return Err(SourceError::HttpStatus(response.status().as_u16()));
        }

        let bytes = response.bytes().await.map_err(SourceError::Network)?;
        let feed = feed_rs::parser::parse(&bytes[..])
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        let cutoff = Utc::now() - ChronoDuration::days(i64::from(days_back));
        let mut articles = Vec::new();

        for entry in feed.entries.into_iter().take(max_articles) {
            let Some(url) = entry.links.first().map(|l| l.href.clone()) else {
                tracing::warn!(entry_id = %entry.id, "Feed entry has no link, skipping");
                continue;
            };
            let Some(article_id) = article_id_from_url(&url) else {
                tracing::warn!(url = %url, "Could not extract article id from URL, skipping");
                continue;
            };
            let Some(published_at) = entry.published.or(entry.updated) else {
                tracing::warn!(url = %url, "Feed entry has no publish date, skipping");
                continue;
            };
            if published_at < cutoff {
                continue;
            }

            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "(untitled)".to_string());
            let author = entry
                .authors
                .first()
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "unknown".to_string());
            let mut tags: Vec<String> = entry.categories.into_iter().map(|c| c.term).collect();
            if tags.is_empty() {
                tags.push("Zenn".to_string());
            }
            let body = entry
                .summary
                .map(|s| strip_html(&s.content))
                .unwrap_or_default();

            articles.push(Article {
                source: Source::Zenn,
                article_id,
                url,
                title,
                author,
                published_at,
                tags,
                likes_count: 0,
                body,
            });
        }

        tracing::info!(feed = %self.feed_url, count = articles.len(), "Fetched Zenn articles");
        Ok(articles)
    }
}

/// Extract the article id from a Zenn article URL
/// (`https://zenn.dev/<user>/articles/<id>`).
fn article_id_from_url(url: &str) -> Option<String> {
    let (_, tail) = url.rsplit_once("/articles/")?;
    let tail = tail.trim_end_matches('/');
    if tail.is_empty() || tail.contains('/') {
        return None;
    }
    Some(tail.to_string())
}

/// Drop HTML tags from feed descriptions, keeping the text content.
fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

// ============================================================================
// Tests
// ============================================================================
