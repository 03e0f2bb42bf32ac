//! Qiita REST API client (`GET /api/v2/items`).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::{Article, Source, SourceError};

pub const DEFAULT_BASE_URL: &str = "https://qiita.com/api/v2";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_PER_PAGE: u32 = 100;

// ============================================================================
// Client
// ============================================================================

pub struct QiitaClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
}

impl QiitaClient {
    /// Create a client. The token is optional — unauthenticated requests are
    /// allowed by the Qiita API at a lower rate limit. The base URL is
    /// injectable for tests.
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        token: Option<SecretString>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token,
        }
    }

    /// Fetch recent popular articles.
    ///
    /// Builds the Qiita search query `created:>=<date> stocks:>=<min_likes>`
    /// (prefixed with `extra_query` when non-empty) and fetches the first
    /// page only — the popularity floor keeps the result set small.
    pub async fn fetch_recent(
        &self,
        days_back: u32,
        per_page: u32,
        min_likes: u32,
        extra_query: &str,
    ) -> Result<Vec<Article>, SourceError> {
        let since = (Utc::now() - ChronoDuration::days(i64::from(days_back))).format("%Y-%m-%d");
        let mut query = format!("created:>={since} stocks:>={min_likes}");
        if !extra_query.trim().is_empty() {
            query = format!("{} {query}", extra_query.trim());
        }

        tracing::debug!(query = %query, "Fetching Qiita items");

        let mut request = self
            .client
            .get(format!("{}/items", self.base_url))
            .query(&[
                ("page", "1".to_string()),
                ("per_page", per_page.min(MAX_PER_PAGE).to_string()),
                ("query", query),
            ]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = tokio::time::timeout(REQUEST_TIMEOUT, request.send())
            .await
            .map_err(|_| SourceError::Timeout)?
            .map_err(SourceError::Network)?;

        if !response.status().is_success() {
            return Err(SourceError::HttpStatus(response.status().as_u16()));
        }

        let items: Vec<QiitaItem> = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        tracing::info!(count = items.len(), "Fetched Qiita articles");
        Ok(items.into_iter().map(QiitaItem::into_article).collect())
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct QiitaItem {
    id: String,
    title: String,
    url: String,
    user: QiitaUser,
    created_at: DateTime<Utc>,
    #[serde(default)]
    likes_count: i64,
    #[serde(default)]
    tags: Vec<QiitaTag>,
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
struct QiitaUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct QiitaTag {
    name: String,
}

impl QiitaItem {
    fn into_article(self) -> Article {
        Article {
            source: Source::Qiita,
            article_id: self.id,
            url: self.url,
            title: self.title,
            author: self.user.id,
            published_at: self.created_at,
            tags: self.tags.into_iter().map(|t| t.name).collect(),
            likes_count: self.likes_count.max(0),
            body: self.body,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param_contains};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // ## delimiters: the body below contains the `"#` sequence
    const ITEMS_JSON: &str = r##"[
        {
            "id": "c686397e4a0f4f11683d",
            "title": "Rust製CLIの作り方",
            "url": "https://qiita.com/someone/items/c686397e4a0f4f11683d",
            "user": { "id": "someone", "name": "Some One" },
            "created_at": "2026-08-20T10:00:00+09:00",
            "likes_count": 42,
            "tags": [ { "name": "Rust" }, { "name": "CLI" } ],
            "body": "# Intro\nBuilding a CLI in Rust..."
        }
    ]"##;

    fn client(base_url: &str) -> QiitaClient {
        QiitaClient::new(reqwest::Client::new(), base_url, None)
    }

    #[tokio::test]
    async fn test_fetch_parses_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param_contains("query", "stocks:>=10"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(ITEMS_JSON)
                    .insert_header("Content-Type", "application/json"),
            )
            .mount(&server)
            .await;

        let articles = client(&server.uri()).fetch_recent(1, 20, 10, "").await.unwrap();
        assert_eq!(articles.len(), 1);
        let article = &articles[0];
        assert_eq!(article.source, Source::Qiita);
        assert_eq!(article.article_id, "c686397e4a0f4f11683d");
        assert_eq!(article.author, "someone");
        assert_eq!(article.tags, ["Rust", "CLI"]);
        assert_eq!(article.likes_count, 42);
    }

    #[tokio::test]
    async fn test_http_error_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let result = client(&server.uri()).fetch_recent(1, 20, 10, "").await;
        match result.unwrap_err() {
            SourceError::HttpStatus(403) => {}
            e => panic!("Expected HttpStatus(403), got {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_json_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        let result = client(&server.uri()).fetch_recent(1, 20, 10, "").await;
        assert!(matches!(result.unwrap_err(), SourceError::Decode(_)));
    }

    #[tokio::test]
    async fn test_extra_query_prefixed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param_contains("query", "tag:rust"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let articles = client(&server.uri())
            .fetch_recent(1, 20, 10, "tag:rust")
            .await
            .unwrap();
        assert!(articles.is_empty());
    }
}
