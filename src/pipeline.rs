//! Batch orchestration: dedup, classify, summarize, render, persist, and
//! regenerate bucket indexes.
//!
//! The pipeline is best-effort per article: one failure is recorded in the
//! batch report and the run moves on. The store's UNIQUE constraint is the
//! dedup authority; `article_exists` is only a fast path that saves the
//! summarization call.

use std::collections::BTreeSet;
use std::io::Write as _;
use std::path::Path;

use crate::classify::{Classification, Classifier};
use crate::path_builder::PathBuilder;
use crate::render::{render_article, render_category_readme};
use crate::source::Article;
use crate::storage::{Database, NewArticle};
use crate::summarize::{Summary, SummaryClient};

/// Separator between documents appended to the same per-day file.
const DOCUMENT_SEPARATOR: &str = "\n\n---\n\n";

/// How many recent articles a bucket README lists.
const README_RECENT_LIMIT: i64 = 10;

// ============================================================================
// Batch Report
// ============================================================================

/// One failed article with enough context to find it again.
#[derive(Debug)]
pub struct BatchFailure {
    pub source: String,
    pub article_id: String,
    pub title: String,
    pub error: String,
}

/// Outcome counters for one pipeline run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub dry_run: bool,
    pub fetched: usize,
    pub skipped_duplicate: usize,
    pub classified_by_rule: usize,
    pub classified_by_model: usize,
    pub classified_as_other: usize,
    pub failed: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn stored(&self) -> usize {
        self.classified_by_rule + self.classified_by_model + self.classified_as_other
    }

    fn record_classification(&mut self, classification: &Classification) {
        match classification {
            Classification::Rule { .. } => self.classified_by_rule += 1,
            Classification::Model { .. } => self.classified_by_model += 1,
            Classification::Fallback => self.classified_as_other += 1,
        }
    }

    fn record_failure(&mut self, article: &Article, error: impl std::fmt::Display) {
        self.failed += 1;
        self.failures.push(BatchFailure {
            source: article.source.to_string(),
            article_id: article.article_id.clone(),
            title: article.title.clone(),
            error: error.to_string(),
        });
    }
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // A dry run classifies but writes nothing, the summary must not
        // claim anything was stored.
        let action = if self.dry_run { "would store" } else { "stored" };
        writeln!(
            f,
            "Processed {} articles: {} {action} ({} by rule, {} by model, {} as other), {} duplicates skipped, {} failed",
            self.fetched,
            self.stored(),
            self.classified_by_rule,
            self.classified_by_model,
            self.classified_as_other,
            self.skipped_duplicate,
            self.failed
        )?;
        for failure in &self.failures {
            writeln!(
                f,
                "  failed {}/{} \"{}\": {}",
                failure.source, failure.article_id, failure.title, failure.error
            )?;
        }
        Ok(())
    }
}

// ============================================================================
// Pipeline
// ============================================================================

pub struct Pipeline {
    db: Database,
    classifier: Classifier,
    paths: PathBuilder,
    summarizer: Option<SummaryClient>,
    dry_run: bool,
}

impl Pipeline {
    pub fn new(
        db: Database,
        classifier: Classifier,
        paths: PathBuilder,
        summarizer: Option<SummaryClient>,
        dry_run: bool,
    ) -> Self {
        Self {
            db,
            classifier,
            paths,
            summarizer,
            dry_run,
        }
    }

    /// Process a batch of fetched articles, then regenerate the README of
    /// every bucket the batch touched.
    pub async fn run(&self, articles: &[Article]) -> BatchReport {
        let mut report = BatchReport {
            dry_run: self.dry_run,
            fetched: articles.len(),
            ..BatchReport::default()
        };
        let mut touched: BTreeSet<(String, Option<String>)> = BTreeSet::new();

        for article in articles {
            match self.process(article, &mut report).await {
                Ok(Some(bucket)) => {
                    touched.insert(bucket);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        source = %article.source,
                        article_id = %article.article_id,
                        error = %e,
                        "Article processing failed"
                    );
                    report.record_failure(article, e);
                }
            }
        }

        if !self.dry_run {
            for (category, subcategory) in &touched {
                if let Err(e) = self.regenerate_readme(category, subcategory.as_deref()).await {
                    tracing::error!(
                        category = %category,
                        subcategory = ?subcategory,
                        error = %e,
                        "README regeneration failed"
                    );
                }
            }
        }

        report
    }

    /// Process one article end to end. Returns the touched bucket on a
    /// successful store, `None` for skips and dry runs.
    async fn process(
        &self,
        article: &Article,
        report: &mut BatchReport,
    ) -> anyhow::Result<Option<(String, Option<String>)>> {
        if self
            .db
            .article_exists(article.source.as_str(), &article.article_id)
            .await?
        {
            tracing::debug!(
                source = %article.source,
                article_id = %article.article_id,
                "Already recorded, skipping"
            );
            report.skipped_duplicate += 1;
            return Ok(None);
        }

        let classification = self
            .classifier
            .classify(article, self.summarizer.as_ref())
            .await;
        let label = classification.label();

        if self.dry_run {
            tracing::info!(
                source = %article.source,
                article_id = %article.article_id,
                label = %label,
                title = %article.title,
                "Dry run: would store"
            );
            report.record_classification(&classification);
            return Ok(None);
        }

        let summary = match &self.summarizer {
            Some(client) => match client.summarize(article).await {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::warn!(
                        article_id = %article.article_id,
                        error = %e,
                        "Summarization failed, storing without summary"
                    );
                    Summary::unavailable()
                }
            },
            None => Summary::unavailable(),
        };

        let path = self.paths.article_path(
            &label.category,
            label.subcategory.as_deref(),
            article.published_at,
            "md",
        );
        let info = self
            .classifier
            .taxonomy()
            .describe(&label.category, label.subcategory.as_deref());
        let document = render_article(article, &summary, &info);
        append_document(&path, &document)?;

        let new_article = NewArticle {
            source: article.source.as_str().to_string(),
            article_id: article.article_id.clone(),
            url: article.url.clone(),
            title: article.title.clone(),
            author: article.author.clone(),
            category: label.category.clone(),
            subcategory: label.subcategory.clone(),
            file_path: path.to_string_lossy().into_owned(),
            tags: article.tags.clone(),
            likes_count: article.likes_count,
            published_at: article.published_at,
        };

        match self.db.insert_article(&new_article).await {
            Ok(_) => {
                report.record_classification(&classification);
                Ok(Some((label.category, label.subcategory)))
            }
            Err(e) if e.is_duplicate() => {
                // Lost an insert race with an overlapping run; the document
                // append stands but the other run owns the record.
                tracing::debug!(
                    source = %article.source,
                    article_id = %article.article_id,
                    "Insert raced with another run, skipping"
                );
                report.skipped_duplicate += 1;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Regenerate the README of every bucket with recorded articles,
    /// regardless of what the current batch touched. Used by the
    /// `--rebuild-indexes` maintenance flag.
    pub async fn rebuild_indexes(&self) -> anyhow::Result<usize> {
        let buckets = self.db.labelled_buckets().await?;
        for (category, subcategory) in &buckets {
            self.regenerate_readme(category, subcategory.as_deref())
                .await?;
        }
        Ok(buckets.len())
    }

    /// Rewrite the bucket's README from committed store state.
    async fn regenerate_readme(
        &self,
        category: &str,
        subcategory: Option<&str>,
    ) -> Result<(), anyhow::Error> {
        let stats = self.db.stats_for(category, subcategory).await?;
        let recent = self
            .db
            .recent_articles(category, subcategory, README_RECENT_LIMIT)
            .await?;
        let info = self.classifier.taxonomy().describe(category, subcategory);

        let doc = render_category_readme(&info, &recent, stats.as_ref(), chrono::Utc::now());
        let path = self.paths.readme_path(category, subcategory);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, doc)?;
        tracing::debug!(path = %path.display(), "Regenerated README");
        Ok(())
    }
}

/// Append a document to a per-day file, creating parent directories and the
/// file as needed. Documents already in the file are preceded by a separator.
fn append_document(path: &Path, document: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let existing = std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    if existing {
        file.write_all(DOCUMENT_SEPARATOR.as_bytes())?;
    }
    file.write_all(document.as_bytes())?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
