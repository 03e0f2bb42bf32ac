use anyhow::{Context, Result};
use clap::Parser;
use futures::future::join_all;
use secrecy::SecretString;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use curate::classify::Classifier;
use curate::config::Config;
use curate::path_builder::PathBuilder;
use curate::pipeline::Pipeline;
use curate::source::{topic_feed_url, Article, QiitaClient, ZennClient};
use curate::storage::Database;
use curate::summarize::SummaryClient;
use curate::taxonomy::Taxonomy;

#[derive(Parser, Debug)]
#[command(name = "curate", about = "Fetch, classify, and archive tech articles")]
struct Args {
    /// Path to the configuration file
    #[arg(long, value_name = "FILE", default_value = "config/config.toml")]
    config: PathBuf,

    /// Override the taxonomy file path from the config
    #[arg(long, value_name = "FILE")]
    taxonomy: Option<PathBuf>,

    /// Classify and report without writing documents or database records
    #[arg(long)]
    dry_run: bool,

    /// Process at most this many fetched articles
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Regenerate every bucket README from the database and exit
    #[arg(long)]
    rebuild_indexes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    url::Url::parse(&config.qiita.base_url)
        .with_context(|| format!("Invalid qiita.base_url: {}", config.qiita.base_url))?;
    url::Url::parse(&config.zenn.feed_url)
        .with_context(|| format!("Invalid zenn.feed_url: {}", config.zenn.feed_url))?;

    // Taxonomy errors are fatal: a bad taxonomy would silently misfile
    // everything into "other".
    let taxonomy_path = args
        .taxonomy
        .unwrap_or_else(|| PathBuf::from(&config.output.taxonomy_path));
    let taxonomy = Taxonomy::load(&taxonomy_path)
        .with_context(|| format!("Failed to load taxonomy from {}", taxonomy_path.display()))?;

    let classifier = Classifier::with_options(taxonomy, config.classifier.options());
    let paths = PathBuilder::new(&config.output.base_dir);

    let db_path = PathBuf::from(&config.output.db_path);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let db = Database::open(&config.output.db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", config.output.db_path))?;

    let http = reqwest::Client::new();

    let summarizer = if config.anthropic.enabled {
        match config.anthropic.resolve_api_key() {
            Some(key) => Some(SummaryClient::new(
                http.clone(),
                key,
                config.anthropic.model.clone(),
                config.anthropic.max_tokens,
                config.anthropic.temperature,
            )),
            None => {
                tracing::warn!(
                    "Anthropic is enabled but no API key found (ANTHROPIC_API_KEY or config); \
                     articles will be stored without summaries"
                );
                None
            }
        }
    } else {
        None
    };

    if args.rebuild_indexes {
        let pipeline = Pipeline::new(db, classifier, paths, None, false);
        let count = pipeline.rebuild_indexes().await?;
        println!("Rebuilt {count} bucket indexes");
        return Ok(());
    }

    let mut articles = fetch_all(&config, &http).await;
    if let Some(limit) = args.limit {
        articles.truncate(limit);
    }
    tracing::info!(count = articles.len(), dry_run = args.dry_run, "Starting batch");

    let pipeline = Pipeline::new(db, classifier, paths, summarizer, args.dry_run);
    let report = pipeline.run(&articles).await;

    print!("{report}");
    Ok(())
}

/// Fetch from every enabled source. A failing source is logged and skipped
/// so one dead API never aborts the run.
async fn fetch_all(config: &Config, http: &reqwest::Client) -> Vec<Article> {
    let mut articles = Vec::new();

    if config.qiita.enabled {
        let token = std::env::var("QIITA_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .map(SecretString::from);
        let client = QiitaClient::new(http.clone(), config.qiita.base_url.clone(), token);
        match client
            .fetch_recent(
                config.qiita.days_back,
                config.qiita.per_page,
                config.qiita.min_likes,
                &config.qiita.query,
            )
            .await
        {
            Ok(fetched) => {
                tracing::info!(count = fetched.len(), "Fetched from Qiita");
                articles.extend(fetched);
            }
            Err(e) => tracing::error!(error = %e, "Qiita fetch failed, continuing"),
        }
    }

    if config.zenn.enabled {
        let mut feeds = vec![config.zenn.feed_url.clone()];
        feeds.extend(config.zenn.topics.iter().map(|t| topic_feed_url(t)));

        // Zenn feeds are independent, fetch them concurrently
        let fetches = feeds.into_iter().map(|feed_url| {
            let client = ZennClient::new(http.clone(), feed_url.clone());
            async move {
                let result = client
                    .fetch_recent(config.zenn.days_back, config.zenn.max_articles)
                    .await;
                (feed_url, result)
            }
        });

        for (feed_url, result) in join_all(fetches).await {
            match result {
                Ok(fetched) => {
                    tracing::info!(count = fetched.len(), feed = %feed_url, "Fetched from Zenn");
                    articles.extend(fetched);
                }
                Err(e) => {
                    tracing::error!(error = %e, feed = %feed_url, "Zenn fetch failed, continuing")
                }
            }
        }
    }

    articles
}
