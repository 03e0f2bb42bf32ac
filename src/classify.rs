//! Rule-based article classification with an optional model fallback.
//!
//! Rule scoring is pure and deterministic: tag matches are high-precision
//! signals and outweigh free-text keyword hits, ties resolve to declaration
//! order in the taxonomy. Only when the rule pass is inconclusive (and a
//! fallback client is supplied) is the summarization service asked for a
//! best guess, which is then validated against the taxonomy. Everything
//! degrades to the "other" category — `classify` is total.

use crate::source::Article;
use crate::summarize::SummaryClient;
use crate::taxonomy::{Taxonomy, FALLBACK_CATEGORY};

// ============================================================================
// Data Structures
// ============================================================================

/// A (category, subcategory) pair. `subcategory` is absent for the fallback
/// category and for model suggestions that name only a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub category: String,
    pub subcategory: Option<String>,
}

impl Label {
    pub fn other() -> Self {
        Self {
            category: FALLBACK_CATEGORY.to_string(),
            subcategory: None,
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.subcategory {
            Some(sub) => write!(f, "{}/{}", self.category, sub),
            None => f.write_str(&self.category),
        }
    }
}

/// Classification outcome with provenance. Downstream logging and batch
/// reporting distinguish rule matches from model guesses from fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The rule pass produced a confident match.
    Rule { label: Label, score: u32 },
    /// The rule pass was inconclusive; the model suggested a valid label.
    Model { label: Label },
    /// Nothing matched: category "other", no subcategory.
    Fallback,
}

impl Classification {
    pub fn label(&self) -> Label {
        match self {
            Classification::Rule { label, .. } | Classification::Model { label } => label.clone(),
            Classification::Fallback => Label::other(),
        }
    }
}

/// Scoring constants. Tag matches are exact hits against curated tag lists
/// and therefore weigh more than substring keyword hits.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierOptions {
    pub tag_weight: u32,
    pub keyword_weight: u32,
    /// Minimum winning score for the rule pass to be conclusive.
    pub min_score: u32,
    /// Character budget for the body prefix included in the matching corpus.
    pub body_budget: usize,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            tag_weight: 3,
            keyword_weight: 1,
            min_score: 1,
            body_budget: 1000,
        }
    }
}

// ============================================================================
// Classifier
// ============================================================================

pub struct Classifier {
    taxonomy: Taxonomy,
    options: ClassifierOptions,
}

impl Classifier {
    pub fn new(taxonomy: Taxonomy) -> Self {
        Self::with_options(taxonomy, ClassifierOptions::default())
    }

    pub fn with_options(taxonomy: Taxonomy, options: ClassifierOptions) -> Self {
        Self { taxonomy, options }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Lowercased body prefix used for keyword matching and as the excerpt
    /// sent to the model fallback.
    pub fn body_excerpt(&self, article: &Article) -> String {
        article
            .body
            .chars()
            .take(self.options.body_budget)
            .collect::<String>()
            .to_lowercase()
    }

    /// Pure rule pass. Returns the strictly-highest-scoring pair at or above
    /// the confidence threshold, or `None` when inconclusive. Ties keep the
    /// earlier-declared category, then the earlier-declared subcategory.
    pub fn classify_by_rule(&self, article: &Article) -> Option<(Label, u32)> {
        let title = article.title.to_lowercase();
        let article_tags: Vec<String> = article.tags.iter().map(|t| t.to_lowercase()).collect();
        let corpus = format!(
            "{title}\n{}\n{}",
            article_tags.join("\n"),
            self.body_excerpt(article)
        );

        let mut best: Option<(Label, u32)> = None;
        for category in self.taxonomy.categories() {
            for sub in &category.subcategories {
                let tag_hits = sub
                    .tags
                    .iter()
                    .filter(|t| article_tags.contains(&t.to_lowercase()))
                    .count() as u32;
                let keyword_hits = sub
                    .keywords
                    .iter()
                    .filter(|k| corpus.contains(&k.to_lowercase()))
                    .count() as u32;
                let score =
                    tag_hits * self.options.tag_weight + keyword_hits * self.options.keyword_weight;

                // Strict > keeps the first-declared pair on ties.
                if score >= self.options.min_score
                    && best.as_ref().map_or(true, |(_, s)| score > *s)
                {
                    best = Some((
                        Label {
                            category: category.key.clone(),
                            subcategory: Some(sub.key.clone()),
                        },
                        score,
                    ));
                }
            }
        }
        best
    }

    /// Classify an article: rule pass first, then the model fallback when
    /// supplied. Total — always returns a label; a failed or invalid
    /// fallback degrades to [`Classification::Fallback`].
    pub async fn classify(
        &self,
        article: &Article,
        fallback: Option<&SummaryClient>,
    ) -> Classification {
        if let Some((label, score)) = self.classify_by_rule(article) {
            tracing::debug!(label = %label, score = score, title = %article.title, "Rule match");
            return Classification::Rule { label, score };
        }

        let Some(client) = fallback else {
            return Classification::Fallback;
        };

        let excerpt = self.body_excerpt(article);
        match client
            .suggest_category(&article.title, &article.tags, &excerpt, &self.taxonomy)
            .await
        {
            Ok((category, subcategory)) => {
                if self.taxonomy.contains(&category, subcategory.as_deref()) {
                    let label = Label {
                        category,
                        subcategory,
                    };
                    tracing::debug!(label = %label, title = %article.title, "Model match");
                    Classification::Model { label }
                } else {
                    tracing::warn!(
                        category = %category,
                        subcategory = ?subcategory,
                        "Model suggested a label outside the taxonomy, falling back to other"
                    );
                    Classification::Fallback
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, title = %article.title, "Category suggestion failed, falling back to other");
                Classification::Fallback
            }
        }
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

    fn taxonomy() -> Taxonomy {
        Taxonomy::from_toml_str(
            r#"
            [[categories]]
            key = "frontend"
            name = "Frontend"
              [[categories.subcategories]]
              key = "react"
              name = "React"
              keywords = ["react hooks"]
              tags = ["React"]
              [[categories.subcategories]]
              key = "vue"
              name = "Vue"
              keywords = ["vue"]
              tags = ["Vue"]

            [[categories]]
            key = "backend"
            name = "Backend"
              [[categories.subcategories]]
              key = "rust"
              name = "Rust"
              keywords = ["tokio", "cargo"]
              tags = ["Rust"]
            "#,
        )
        .unwrap()
    }

    fn article(title: &str, tags: &[&str], body: &str) -> Article {
        Article {
            source: Source::Qiita,
            article_id: "id".to_string(),
            url: "https://example.com/a".to_string(),
            title: title.to_string(),
            author: "someone".to_string(),
            published_at: Utc::now(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            likes_count: 0,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_tag_match_wins_by_rule() {
        let classifier = Classifier::new(taxonomy());
        let article = article("Building a dashboard", &["React", "TypeScript"], "");

        let (label, score) = classifier.classify_by_rule(&article).unwrap();
        assert_eq!(label.category, "frontend");
        assert_eq!(label.subcategory.as_deref(), Some("react"));
        assert_eq!(score, 3); // one tag hit at default tag_weight
    }

    #[test]
    fn test_keyword_match_in_title_and_body() {
        let classifier = Classifier::new(taxonomy());
        let article = article("Async runtimes compared", &[], "We benchmark tokio and cargo workflows");

        let (label, score) = classifier.classify_by_rule(&article).unwrap();
        assert_eq!(label.category, "backend");
        assert_eq!(label.subcategory.as_deref(), Some("rust"));
        assert_eq!(score, 2); // two keyword hits at default keyword_weight
    }

    #[test]
    fn test_tag_outweighs_keywords() {
        let classifier = Classifier::new(taxonomy());
        // Two rust keyword hits (score 2) vs one Vue tag hit (score 3)
        let article = article("tokio and cargo tips", &["Vue"], "");

        let (label, _) = classifier.classify_by_rule(&article).unwrap();
        assert_eq!(label.subcategory.as_deref(), Some("vue"));
    }

    #[test]
    fn test_no_signal_is_inconclusive() {
        let classifier = Classifier::new(taxonomy());
        let article = article("Cooking with gas", &["Recipes"], "no tech here");
        assert!(classifier.classify_by_rule(&article).is_none());
    }

    #[test]
    fn test_tie_break_prefers_declaration_order() {
        let classifier = Classifier::new(taxonomy());
        // One tag hit each for frontend/react and backend/rust: equal scores,
        // frontend is declared first.
        let article = article("untitled", &["React", "Rust"], "");

        let (label, _) = classifier.classify_by_rule(&article).unwrap();
        assert_eq!(label.category, "frontend");
        assert_eq!(label.subcategory.as_deref(), Some("react"));
    }

    #[test]
    fn test_tie_break_is_reproducible() {
        let classifier = Classifier::new(taxonomy());
        let article = article("untitled", &["React", "Rust"], "");
        let first = classifier.classify_by_rule(&article);
        for _ in 0..10 {
            assert_eq!(classifier.classify_by_rule(&article), first);
        }
    }

    #[test]
    fn test_body_budget_truncates_corpus() {
        let options = ClassifierOptions {
            body_budget: 10,
            ..ClassifierOptions::default()
        };
        let classifier = Classifier::with_options(taxonomy(), options);
        // The keyword appears beyond the 10-char budget only.
        let body = format!("{}tokio tokio", "x".repeat(20));
        let article = article("untitled", &[], &body);
        assert!(classifier.classify_by_rule(&article).is_none());
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let classifier = Classifier::new(taxonomy());
        let article = article("untitled", &["rEaCt"], "");
        let (label, _) = classifier.classify_by_rule(&article).unwrap();
        assert_eq!(label.subcategory.as_deref(), Some("react"));
    }

    #[tokio::test]
    async fn test_classify_without_fallback_degrades_to_other() {
        let classifier = Classifier::new(taxonomy());
        let article = article("Cooking with gas", &[], "");

        let classification = classifier.classify(&article, None).await;
        assert_eq!(classification, Classification::Fallback);
        assert_eq!(classification.label(), Label::other());
    }

    #[tokio::test]
    async fn test_rule_match_never_calls_fallback() {
        // No fallback client supplied, but a rule match must not need one.
        let classifier = Classifier::new(taxonomy());
        let article = article("untitled", &["React"], "");

        match classifier.classify(&article, None).await {
            Classification::Rule { label, .. } => {
                assert_eq!(label.category, "frontend");
            }
            other => panic!("Expected rule match, got {other:?}"),
        }
    }

    #[test]
    fn test_label_display() {
        assert_eq!(
            Label {
                category: "frontend".to_string(),
                subcategory: Some("react".to_string())
            }
            .to_string(),
            "frontend/react"
        );
        assert_eq!(Label::other().to_string(), "other");
    }
}
