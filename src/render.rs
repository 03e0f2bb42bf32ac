//! Markdown rendering for archive documents.
//!
//! Pure string builders: the pipeline decides where the output goes and
//! whether it is appended or overwritten. Article documents accumulate in
//! per-day files; bucket READMEs are regenerated whole after each run.

use chrono::{DateTime, Utc};

use crate::source::Article;
use crate::storage::{ArticleRecord, CategoryStats};
use crate::summarize::Summary;
use crate::taxonomy::CategoryInfo;

/// Render one article as a markdown document section.
///
/// The output is appended to the bucket's per-day file, so it carries its
/// own heading and never assumes it is alone in the file.
pub fn render_article(article: &Article, summary: &Summary, info: &CategoryInfo) -> String {
    let mut doc = String::new();

    doc.push_str(&format!("# [{}]({})\n\n", article.title, article.url));

    match &info.subcategory_name {
        Some(sub) => doc.push_str(&format!("> **{}** › **{}**\n\n", info.category_name, sub)),
        None => doc.push_str(&format!("> **{}**\n\n", info.category_name)),
    }

    doc.push_str("## Meta\n\n");
    doc.push_str(&format!("- Author: {}\n", article.author));
    doc.push_str(&format!(
        "- Published: {}\n",
        article.published_at.format("%Y-%m-%d %H:%M UTC")
    ));
    doc.push_str(&format!("- Likes: {}\n", article.likes_count));
    if !article.tags.is_empty() {
        doc.push_str(&format!("- Tags: {}\n", article.tags.join(", ")));
    }
    doc.push_str(&format!("- Source: {}\n", article.source));

    doc.push_str("\n## Summary\n\n");
    doc.push_str(&summary.summary);
    doc.push('\n');

    if !summary.key_points.is_empty() {
        doc.push_str("\n## Key points\n\n");
        for point in &summary.key_points {
            doc.push_str(&format!("- {point}\n"));
        }
    }

    if !summary.technologies.is_empty() {
        doc.push_str("\n## Technologies\n\n");
        for tech in &summary.technologies {
            doc.push_str(&format!("- {tech}\n"));
        }
    }

    doc
}

/// Render a bucket's README index: description, statistics, recent articles.
///
/// Regenerated from the store after every run, so it always reflects
/// committed state only.
pub fn render_category_readme(
    info: &CategoryInfo,
    recent: &[ArticleRecord],
    stats: Option<&CategoryStats>,
    generated_at: DateTime<Utc>,
) -> String {
    let mut doc = String::new();

    match &info.subcategory_name {
        Some(sub) => doc.push_str(&format!("# {} / {}\n\n", info.category_name, sub)),
        None => doc.push_str(&format!("# {}\n\n", info.category_name)),
    }

    if !info.category_description.is_empty() {
        doc.push_str(&info.category_description);
        doc.push_str("\n\n");
    }

    if let Some(stats) = stats {
        doc.push_str("## Statistics\n\n");
        doc.push_str(&format!("- Articles: {}\n", stats.article_count));
        doc.push_str(&format!("- Total likes: {}\n", stats.total_likes));
        doc.push_str(&format!(
            "- Last updated: {}\n\n",
            stats.last_updated.format("%Y-%m-%d %H:%M UTC")
        ));
    }

    if !recent.is_empty() {
        doc.push_str("## Recent articles\n\n");
        for record in recent {
            doc.push_str(&format!(
                "- {} [{}]({}) — {} ({} likes)\n",
                record.published_at.format("%Y-%m-%d"),
                record.title,
                record.url,
                record.author,
                record.likes_count
            ));
        }
        doc.push('\n');
    }

    doc.push_str(&format!(
        "_Generated {}_\n",
        generated_at.format("%Y-%m-%d %H:%M UTC")
    ));
    doc
}

// ============================================================================
// Tests
// ============================================================================
