//! Configuration file parser for config/config.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`,
//! which fetches from both sources with conservative limits. Unknown
//! top-level keys are accepted but logged as potential typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::classify::ClassifierOptions;
use crate::source::{qiita, zenn};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All sections use `#[serde(default)]` so any subset of keys can be
/// specified. Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub qiita: QiitaConfig,
    pub zenn: ZennConfig,
    pub anthropic: AnthropicConfig,
    pub output: OutputConfig,
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QiitaConfig {
    pub enabled: bool,
    /// How far back to search, in days.
    pub days_back: u32,
    /// Page size for the search request (Qiita caps this at 100).
    pub per_page: u32,
    /// Minimum stock count for an article to be fetched.
    pub min_likes: u32,
    /// Extra search terms prepended to the generated query (e.g. "tag:rust").
    pub query: String,
    pub base_url: String,
}

impl Default for QiitaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            days_back: 1,
            per_page: 20,
            min_likes: 10,
            query: String::new(),
            base_url: qiita::DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ZennConfig {
    pub enabled: bool,
    pub days_back: u32,
    /// Cap on entries taken from each feed.
    pub max_articles: usize,
    pub feed_url: String,
    /// Additional per-topic feeds to poll alongside the main feed.
    pub topics: Vec<String>,
}

impl Default for ZennConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            days_back: 1,
            max_articles: 50,
            feed_url: zenn::DEFAULT_FEED_URL.to_string(),
            topics: Vec::new(),
        }
    }
}

/// Summarization settings.
///
/// Custom Debug impl masks `api_key` to prevent secret leakage in logs,
/// error messages, and debug output. The ANTHROPIC_API_KEY env var takes
/// precedence over the config file.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    pub enabled: bool,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub api_key: Option<String>,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1000,
            temperature: 0.3,
            api_key: None,
        }
    }
}

impl std::fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("enabled", &self.enabled)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AnthropicConfig {
    /// Resolve the API key: env var first, then config file.
    pub fn resolve_api_key(&self) -> Option<SecretString> {
        std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.api_key.clone())
            .map(SecretString::from)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root of the markdown archive tree.
    pub base_dir: String,
    pub db_path: String,
    pub taxonomy_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: "articles".to_string(),
            db_path: "data/articles.db".to_string(),
            taxonomy_path: "config/categories.toml".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub tag_weight: u32,
    pub keyword_weight: u32,
    pub min_score: u32,
    pub body_budget: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let defaults = ClassifierOptions::default();
        Self {
            tag_weight: defaults.tag_weight,
            keyword_weight: defaults.keyword_weight,
            min_score: defaults.min_score,
            body_budget: defaults.body_budget,
        }
    }
}

impl ClassifierConfig {
    pub fn options(&self) -> ClassifierOptions {
        ClassifierOptions {
            tag_weight: self.tag_weight,
            keyword_weight: self.keyword_weight,
            min_score: self.min_score,
            body_budget: self.body_budget,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown top-level keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to prevent memory exhaustion from
        // a corrupted config file.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse as a raw table first to flag likely section-name typos
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = ["qiita", "zenn", "anthropic", "output", "classifier"];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            qiita = config.qiita.enabled,
            zenn = config.zenn.enabled,
            anthropic = config.anthropic.enabled,
            "Loaded configuration"
        );
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================
