//! Category/subcategory taxonomy loaded from a TOML file.
//!
//! The taxonomy is loaded once at startup and immutable for the run.
//! Categories and subcategories are declared as arrays of tables so their
//! declaration order is preserved — classification tie-breaks depend on it.
//! Malformed taxonomies (duplicate keys, subcategories with no matchable
//! signals) fail fast at load time rather than being silently ignored.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Category assigned when neither rules nor the model fallback produce a
/// label. Reserved: it may not appear in the configured taxonomy.
pub const FALLBACK_CATEGORY: &str = "other";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("Failed to read taxonomy file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in taxonomy file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid taxonomy: {0}")]
    Invalid(String),
}

// ============================================================================
// Definitions
// ============================================================================

/// A subcategory with the signals used to rule-match articles into it.
#[derive(Debug, Clone, Deserialize)]
pub struct SubcategoryDef {
    pub key: String,
    pub name: String,
    /// Substrings matched against the lowercased title/tags/body corpus.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Exact (case-insensitive) matches against the article's tag list.
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryDef {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subcategories: Vec<SubcategoryDef>,
}

/// Display information for a (category, subcategory) pair, with raw-key
/// fallbacks for labels outside the taxonomy (e.g. "other").
#[derive(Debug, Clone)]
pub struct CategoryInfo {
    pub category: String,
    pub category_name: String,
    pub category_description: String,
    pub subcategory: Option<String>,
    pub subcategory_name: Option<String>,
}

// ============================================================================
// Taxonomy
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Taxonomy {
    #[serde(default)]
    categories: Vec<CategoryDef>,
}

impl Taxonomy {
    /// Load and validate a taxonomy from a TOML file.
    ///
    /// Unlike the application config, a missing taxonomy file is an error:
    /// the pipeline cannot classify without one.
    pub fn load(path: &Path) -> Result<Self, TaxonomyError> {
        let content = std::fs::read_to_string(path)?;
        let taxonomy = Self::from_toml_str(&content)?;
        tracing::info!(
            path = %path.display(),
            categories = taxonomy.categories.len(),
            "Loaded taxonomy"
        );
        Ok(taxonomy)
    }

    /// Parse and validate a taxonomy from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, TaxonomyError> {
        let taxonomy: Taxonomy = toml::from_str(content)?;
        taxonomy.validate()?;
        Ok(taxonomy)
    }

    fn validate(&self) -> Result<(), TaxonomyError> {
        let mut seen_categories = HashSet::new();
        for category in &self.categories {
            if category.key.trim().is_empty() {
                return Err(TaxonomyError::Invalid(
                    "category key cannot be empty".into(),
                ));
            }
            if category.key == FALLBACK_CATEGORY {
                return Err(TaxonomyError::Invalid(format!(
                    "category key '{FALLBACK_CATEGORY}' is reserved for unclassified articles"
                )));
            }
            if !seen_categories.insert(category.key.as_str()) {
                return Err(TaxonomyError::Invalid(format!(
                    "duplicate category key '{}'",
                    category.key
                )));
            }

            let mut seen_subcategories = HashSet::new();
            for sub in &category.subcategories {
                if sub.key.trim().is_empty() {
                    return Err(TaxonomyError::Invalid(format!(
                        "empty subcategory key in category '{}'",
                        category.key
                    )));
                }
                if !seen_subcategories.insert(sub.key.as_str()) {
                    return Err(TaxonomyError::Invalid(format!(
                        "duplicate subcategory key '{}' in category '{}'",
                        sub.key, category.key
                    )));
                }
                if sub.keywords.is_empty() && sub.tags.is_empty() {
                    return Err(TaxonomyError::Invalid(format!(
                        "subcategory '{}/{}' has no keywords and no tags, it can never be rule-matched",
                        category.key, sub.key
                    )));
                }
            }
        }
        Ok(())
    }

    /// All categories in declaration order.
    pub fn categories(&self) -> &[CategoryDef] {
        &self.categories
    }

    /// Look up a category definition by key.
    pub fn resolve(&self, category_key: &str) -> Option<&CategoryDef> {
        self.categories.iter().find(|c| c.key == category_key)
    }

    /// Whether a label is valid against this taxonomy.
    ///
    /// The fallback category "other" (with no subcategory) is always valid.
    /// Any other category must be configured, and a present subcategory must
    /// belong to that category's configured set.
    pub fn contains(&self, category: &str, subcategory: Option<&str>) -> bool {
        if category == FALLBACK_CATEGORY {
            return subcategory.is_none();
        }
        match self.resolve(category) {
            Some(def) => match subcategory {
                Some(sub) => def.subcategories.iter().any(|s| s.key == sub),
                None => true,
            },
            None => false,
        }
    }

    /// Display information for a label, falling back to raw keys for labels
    /// outside the taxonomy.
    pub fn describe(&self, category: &str, subcategory: Option<&str>) -> CategoryInfo {
        let category_def = self.resolve(category);
        let subcategory_def = category_def.and_then(|c| {
            subcategory.and_then(|sub| c.subcategories.iter().find(|s| s.key == sub))
        });

        CategoryInfo {
            category: category.to_string(),
            category_name: category_def
                .map(|c| c.name.clone())
                .unwrap_or_else(|| category.to_string()),
            category_description: category_def
                .map(|c| c.description.clone())
                .unwrap_or_default(),
            subcategory: subcategory.map(str::to_string),
            subcategory_name: subcategory.map(|sub| {
                subcategory_def
                    .map(|s| s.name.clone())
                    .unwrap_or_else(|| sub.to_string())
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
