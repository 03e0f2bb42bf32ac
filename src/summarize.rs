//! Anthropic messages API client.
//!
//! Two operations: structured article summaries, and best-guess category
//! suggestions used as the classifier's fallback when rule matching is
//! inconclusive. Every failure here is a transient signal to the caller —
//! the pipeline degrades (placeholder summary, "other" category) instead of
//! aborting an article.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use crate::source::Article;
use crate::taxonomy::Taxonomy;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Bounded per-call timeout so a stalled model call cannot stall the batch.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Body prefix sent with summary requests. Truncation is deliberate: it
/// bounds cost and avoids biasing toward longer articles.
const SUMMARY_BODY_BUDGET: usize = 5000;
/// Token cap for the single-line category suggestion reply.
const SUGGESTION_MAX_TOKENS: u32 = 50;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Request timed out")]
    Timeout,
    #[error("Malformed response: {0}")]
    Malformed(String),
}

// ============================================================================
// Data Structures
// ============================================================================

/// Structured summary extracted from the model's sectioned reply.
#[derive(Debug, Clone)]
pub struct Summary {
    pub summary: String,
    pub key_points: Vec<String>,
    pub technologies: Vec<String>,
}

impl Summary {
    /// Placeholder recorded when summarization is disabled or failed.
    pub fn unavailable() -> Self {
        Self {
            summary: "Summary unavailable.".to_string(),
            key_points: Vec::new(),
            technologies: Vec::new(),
        }
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct SummaryClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl SummaryClient {
    pub fn new(
        client: reqwest::Client,
        api_key: SecretString,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model: model.into(),
            max_tokens,
            temperature,
        }
    }

    /// Override the API base URL (tests point this at a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Generate a structured summary for an article.
    pub async fn summarize(&self, article: &Article) -> Result<Summary, SummaryError> {
        let prompt = build_summary_prompt(article);
        let text = self.complete(&prompt, self.max_tokens).await?;
        Ok(parse_summary(&text))
    }

    /// Ask the model for a best-guess (category, subcategory) from the
    /// configured taxonomy. The caller validates the label — this function
    /// only parses the `category/subcategory` reply shape.
    pub async fn suggest_category(
        &self,
        title: &str,
        tags: &[String],
        body_excerpt: &str,
        taxonomy: &Taxonomy,
    ) -> Result<(String, Option<String>), SummaryError> {
        let prompt = build_category_prompt(title, tags, body_excerpt, taxonomy);
        let text = self.complete(&prompt, SUGGESTION_MAX_TOKENS).await?;
        parse_category_reply(&text).ok_or_else(|| {
            SummaryError::Malformed(format!(
                "expected 'category/subcategory', got {:?}",
                text.trim()
            ))
        })
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, SummaryError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "temperature": self.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let request = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        let response = tokio::time::timeout(REQUEST_TIMEOUT, request.send())
            .await
            .map_err(|_| SummaryError::Timeout)?
            .map_err(SummaryError::Network)?;

        if !response.status().is_success() {
            return Err(SummaryError::HttpStatus(response.status().as_u16()));
        }

        let message: MessagesResponse = response
            .json()
            .await
            .map_err(|e| SummaryError::Malformed(e.to_string()))?;

        message
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| SummaryError::Malformed("no text content block".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

// ============================================================================
// Prompts & Parsing
// ============================================================================

fn truncate_chars(s: &str, budget: usize) -> String {
    s.chars().take(budget).collect()
}

fn build_summary_prompt(article: &Article) -> String {
    format!(
        "Summarize the following technical article.\n\n\
         # Article\n\
         - Title: {title}\n\
         - Tags: {tags}\n\n\
         # Body\n\
         {body}\n\n\
         # Requirements\n\
         Respond in exactly this format:\n\n\
         ## Summary\n\
         (3-4 sentences summarizing the article)\n\n\
         ## Key points\n\
         - (important point)\n\n\
         ## Technologies\n\
         - (technology used)\n\n\
         Keep technical terms as-is, focus on what the article enables or \
         solves rather than implementation detail, and do not include code \
         snippets.\n",
        title = article.title,
        tags = article.tags.join(", "),
        body = truncate_chars(&article.body, SUMMARY_BODY_BUDGET),
    )
}

fn build_category_prompt(
    title: &str,
    tags: &[String],
    body_excerpt: &str,
    taxonomy: &Taxonomy,
) -> String {
    let mut pairs = String::new();
    for category in taxonomy.categories() {
        for sub in &category.subcategories {
            pairs.push_str(&format!("{}/{} - {}\n", category.key, sub.key, sub.name));
        }
    }

    format!(
        "Classify the following technical article into the single most \
         appropriate category.\n\n\
         Title: {title}\n\
         Tags: {tags}\n\
         Excerpt: {body_excerpt}\n\n\
         Available categories:\n\
         {pairs}\n\
         Reply with exactly one line in the form category/subcategory and \
         nothing else.\n\n\
         Example: frontend/react\n",
        tags = tags.join(", "),
    )
}

/// Extract (summary, key points, technologies) from the model's sectioned
/// markdown reply. Unknown sections and stray headers are ignored.
fn parse_summary(response: &str) -> Summary {
    #[derive(PartialEq)]
    enum Section {
        None,
        Summary,
        KeyPoints,
        Technologies,
    }

    let mut section = Section::None;
    let mut summary_lines = Vec::new();
    let mut key_points = Vec::new();
    let mut technologies = Vec::new();

    for line in response.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(heading) = line.strip_prefix("##") {
            section = match heading.trim().to_lowercase().as_str() {
                "summary" => Section::Summary,
                "key points" => Section::KeyPoints,
                "technologies" | "tech stack" => Section::Technologies,
                _ => Section::None,
            };
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        let bullet = line
            .strip_prefix('-')
            .or_else(|| line.strip_prefix('•'))
            .map(str::trim);

        match section {
            Section::Summary => {
                if bullet.is_none() {
                    summary_lines.push(line.to_string());
                }
            }
            Section::KeyPoints => {
                if let Some(point) = bullet {
                    key_points.push(point.to_string());
                }
            }
            Section::Technologies => {
                if let Some(tech) = bullet {
                    technologies.push(tech.to_string());
                }
            }
            Section::None => {}
        }
    }

    Summary {
        summary: if summary_lines.is_empty() {
            "No summary available".to_string()
        } else {
            summary_lines.join(" ")
        },
        key_points,
        technologies,
    }
}

/// Parse a `category/subcategory` reply. A bare category is accepted (the
/// subcategory is then absent); the label is validated by the caller.
fn parse_category_reply(text: &str) -> Option<(String, Option<String>)> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    match line.split_once('/') {
        Some((category, subcategory)) => {
            let category = category.trim();
            if category.is_empty() {
                return None;
            }
            let subcategory = subcategory.trim();
            Some((
                category.to_string(),
                (!subcategory.is_empty()).then(|| subcategory.to_string()),
            ))
        }
        None => Some((line.to_string(), None)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Source;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_article() -> Article {
        Article {
            source: Source::Qiita,
            article_id: "abc".to_string(),
            url: "https://qiita.com/x/items/abc".to_string(),
            title: "Testing async Rust".to_string(),
            author: "x".to_string(),
            published_at: Utc::now(),
            tags: vec!["Rust".to_string()],
            likes_count: 5,
            body: "body text".to_string(),
        }
    }

    fn test_client(base_url: &str) -> SummaryClient {
        SummaryClient::new(
            reqwest::Client::new(),
            SecretString::from("test-key"),
            "claude-sonnet-4-20250514",
            1000,
            0.3,
        )
        .with_base_url(base_url)
    }

    fn messages_response(text: &str) -> String {
        serde_json::json!({
            "content": [{ "type": "text", "text": text }],
            "model": "claude-sonnet-4-20250514",
            "role": "assistant"
        })
        .to_string()
    }

    #[test]
    fn test_parse_summary_sections() {
        let reply = "\
## Summary
Covers async testing patterns.
Explains tokio test utilities.

## Key points
- Use #[tokio::test]
- Control time with pause()

## Technologies
- Rust
- Tokio
";
        let summary = parse_summary(reply);
        assert_eq!(
            summary.summary,
            "Covers async testing patterns. Explains tokio test utilities."
        );
        assert_eq!(
            summary.key_points,
            ["Use #[tokio::test]", "Control time with pause()"]
        );
        assert_eq!(summary.technologies, ["Rust", "Tokio"]);
    }

    #[test]
    fn test_parse_summary_empty_reply() {
        let summary = parse_summary("");
        assert_eq!(summary.summary, "No summary available");
        assert!(summary.key_points.is_empty());
    }

    #[test]
    fn test_parse_category_reply() {
        assert_eq!(
            parse_category_reply("frontend/react"),
            Some(("frontend".to_string(), Some("react".to_string())))
        );
        assert_eq!(
            parse_category_reply("\n  backend/rust  \n"),
            Some(("backend".to_string(), Some("rust".to_string())))
        );
        assert_eq!(
            parse_category_reply("other"),
            Some(("other".to_string(), None))
        );
        assert_eq!(parse_category_reply(""), None);
        assert_eq!(parse_category_reply("/react"), None);
    }

    #[tokio::test]
    async fn test_summarize_roundtrip() {
        let server = MockServer::start().await;
        let reply = "## Summary\nGood article.\n\n## Key points\n- One\n\n## Technologies\n- Rust\n";
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(messages_response(reply))
                    .insert_header("Content-Type", "application/json"),
            )
            .mount(&server)
            .await;

        let summary = test_client(&server.uri())
            .summarize(&test_article())
            .await
            .unwrap();
        assert_eq!(summary.summary, "Good article.");
        assert_eq!(summary.key_points, ["One"]);
        assert_eq!(summary.technologies, ["Rust"]);
    }

    #[tokio::test]
    async fn test_http_error_is_transient_signal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529))
            .mount(&server)
            .await;

        let result = test_client(&server.uri()).summarize(&test_article()).await;
        match result.unwrap_err() {
            SummaryError::HttpStatus(529) => {}
            e => panic!("Expected HttpStatus(529), got {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_suggest_category_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(messages_response("frontend/react"))
                    .insert_header("Content-Type", "application/json"),
            )
            .mount(&server)
            .await;

        let taxonomy = Taxonomy::from_toml_str(
            r#"
            [[categories]]
            key = "frontend"
            name = "Frontend"
              [[categories.subcategories]]
              key = "react"
              name = "React"
              tags = ["React"]
            "#,
        )
        .unwrap();

        let label = test_client(&server.uri())
            .suggest_category("t", &["React".to_string()], "excerpt", &taxonomy)
            .await
            .unwrap();
        assert_eq!(label, ("frontend".to_string(), Some("react".to_string())));
    }

    #[tokio::test]
    async fn test_missing_text_block_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"content": []}"#)
                    .insert_header("Content-Type", "application/json"),
            )
            .mount(&server)
            .await;

        let result = test_client(&server.uri()).summarize(&test_article()).await;
        assert!(matches!(result.unwrap_err(), SummaryError::Malformed(_)));
    }
}
