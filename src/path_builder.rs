//! Deterministic mapping from (category, subcategory, publish date) to
//! archive paths. Pure — directory creation happens at the call site.
//!
//! Layout: `<base>/<category>[/<subcategory>]/<YYYY-MM>/<YYYY-MM-DD>.<ext>`.
//! Articles published the same day in the same bucket share one file on
//! purpose: callers append, producing one document per bucket per day.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PathBuilder {
    base_dir: PathBuf,
}

impl PathBuilder {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory for a (category, subcategory) bucket. The subcategory
    /// segment is omitted when the label has none.
    pub fn bucket_dir(&self, category: &str, subcategory: Option<&str>) -> PathBuf {
        let mut dir = self.base_dir.join(category);
        if let Some(sub) = subcategory {
            dir.push(sub);
        }
        dir
    }

    /// File that an article's rendered document is appended to.
    pub fn article_path(
        &self,
        category: &str,
        subcategory: Option<&str>,
        published_at: DateTime<Utc>,
        extension: &str,
    ) -> PathBuf {
        let mut path = self.bucket_dir(category, subcategory);
        path.push(published_at.format("%Y-%m").to_string());
        path.push(format!("{}.{extension}", published_at.format("%Y-%m-%d")));
        path
    }

    /// Index document for a bucket, regenerated from statistics after a run.
    pub fn readme_path(&self, category: &str, subcategory: Option<&str>) -> PathBuf {
        self.bucket_dir(category, subcategory).join("README.md")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn builder() -> PathBuilder {
        PathBuilder::new("articles")
    }

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_article_path_with_subcategory() {
        let path = builder().article_path("frontend", Some("react"), date(2026, 8, 5), "md");
        assert_eq!(
            path,
            PathBuf::from("articles/frontend/react/2026-08/2026-08-05.md")
        );
    }

    #[test]
    fn test_article_path_omits_missing_subcategory() {
        let path = builder().article_path("other", None, date(2026, 8, 5), "md");
        assert_eq!(path, PathBuf::from("articles/other/2026-08/2026-08-05.md"));
    }

    #[test]
    fn test_same_day_same_bucket_collides_by_design() {
        let a = builder().article_path("frontend", Some("react"), date(2026, 8, 5), "md");
        let b = builder().article_path(
            "frontend",
            Some("react"),
            Utc.with_ymd_and_hms(2026, 8, 5, 23, 59, 59).unwrap(),
            "md",
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_days_do_not_collide() {
        let a = builder().article_path("frontend", Some("react"), date(2026, 8, 5), "md");
        let b = builder().article_path("frontend", Some("react"), date(2026, 8, 6), "md");
        assert_ne!(a, b);
    }

    #[test]
    fn test_readme_path() {
        assert_eq!(
            builder().readme_path("frontend", Some("react")),
            PathBuf::from("articles/frontend/react/README.md")
        );
        assert_eq!(
            builder().readme_path("other", None),
            PathBuf::from("articles/other/README.md")
        );
    }

    #[test]
    fn test_month_and_day_zero_padded() {
        let path = builder().article_path("backend", Some("rust"), date(2026, 1, 2), "md");
        assert_eq!(
            path,
            PathBuf::from("articles/backend/rust/2026-01/2026-01-02.md")
        );
    }

    proptest! {
        // Stability: identical inputs always produce identical output, and
        // the output stays under the bucket directory.
        #[test]
        fn prop_path_is_stable_and_rooted(
            category in "[a-z]{1,12}",
            subcategory in proptest::option::of("[a-z]{1,12}"),
            secs in 0i64..4_102_444_800, // through 2099
        ) {
            let builder = builder();
            let ts = Utc.timestamp_opt(secs, 0).unwrap();
            let first = builder.article_path(&category, subcategory.as_deref(), ts, "md");
            let second = builder.article_path(&category, subcategory.as_deref(), ts, "md");
            prop_assert_eq!(&first, &second);
            prop_assert!(first.starts_with(builder.bucket_dir(&category, subcategory.as_deref())));
        }
    }
}
