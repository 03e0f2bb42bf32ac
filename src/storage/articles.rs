use super::schema::Database;
use super::types::{
    is_unique_violation, subcategory_to_sql, ArticleDbRow, ArticleRecord, NewArticle, StorageError,
};

const ARTICLE_COLUMNS: &str = "id, source, article_id, url, title, author, category, \
                               subcategory, file_path, tags, likes_count, published_at, created_at";

impl Database {
    // ========================================================================
    // Article Operations
    // ========================================================================

    /// Dedup check: has this (source, article_id) identity been recorded?
    ///
    /// This is the orchestrator's fast path only — the UNIQUE constraint in
    /// [`Database::insert_article`] is what actually closes the
    /// check-then-act race across overlapping runs.
    pub async fn article_exists(
        &self,
        source: &str,
        article_id: &str,
    ) -> Result<bool, StorageError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM articles WHERE source = ? AND article_id = ? LIMIT 1")
                .bind(source)
                .bind(article_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Insert an article record and credit its stats bucket in one
    /// transaction. Returns the new row id.
    ///
    /// A second insert of the same (source, article_id) fails with
    /// [`StorageError::Duplicate`] and leaves the stats untouched — both
    /// writes commit or neither does, so `article_count`/`total_likes` never
    /// diverge from the article rows.
    pub async fn insert_article(&self, article: &NewArticle) -> Result<i64, StorageError> {
        let now = chrono::Utc::now().timestamp();
        let tags_json =
            serde_json::to_string(&article.tags).unwrap_or_else(|_| "[]".to_string());
        let subcategory = subcategory_to_sql(article.subcategory.as_deref());

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO articles (
                source, article_id, url, title, author,
                category, subcategory, file_path, tags,
                likes_count, published_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(&article.source)
        .bind(&article.article_id)
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.author)
        .bind(&article.category)
        .bind(subcategory)
        .bind(&article.file_path)
        .bind(&tags_json)
        .bind(article.likes_count)
        .bind(article.published_at.timestamp())
        .bind(now)
        .execute(&mut *tx)
        .await;

        let id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(e) if is_unique_violation(&e) => {
                // Transaction dropped here rolls back; nothing was credited.
                return Err(StorageError::Duplicate {
                    origin: article.source.clone(),
                    article_id: article.article_id.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        sqlx::query(
            r#"
            INSERT INTO category_stats (category, subcategory, article_count, total_likes, last_updated)
            VALUES (?, ?, 1, ?, ?)
            ON CONFLICT(category, subcategory) DO UPDATE SET
                article_count = article_count + 1,
                total_likes = total_likes + excluded.total_likes,
                last_updated = excluded.last_updated
        "#,
        )
        .bind(&article.category)
        .bind(subcategory)
        .bind(article.likes_count)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            source = %article.source,
            article_id = %article.article_id,
            category = %article.category,
            subcategory = %subcategory,
            "Recorded article"
        );
        Ok(id)
    }

    /// Most recent articles in a bucket, newest first. Used to regenerate
    /// the bucket's README.
    pub async fn recent_articles(
        &self,
        category: &str,
        subcategory: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ArticleRecord>, StorageError> {
        let rows: Vec<ArticleDbRow> = sqlx::query_as(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             WHERE category = ? AND subcategory = ? \
             ORDER BY published_at DESC, created_at DESC \
             LIMIT ?"
        ))
        .bind(category)
        .bind(subcategory_to_sql(subcategory))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ArticleDbRow::into_record).collect())
    }

    /// All distinct (category, subcategory) buckets with at least one
    /// recorded article, in key order.
    pub async fn labelled_buckets(&self) -> Result<Vec<(String, Option<String>)>, StorageError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT DISTINCT category, subcategory FROM articles ORDER BY category, subcategory",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(category, subcategory)| {
                (category, super::types::sql_to_subcategory(subcategory))
            })
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn new_article(article_id: &str, category: &str, subcategory: Option<&str>, likes: i64) -> NewArticle {
        NewArticle {
            source: "qiita".to_string(),
            article_id: article_id.to_string(),
            url: format!("https://qiita.com/x/items/{article_id}"),
            title: format!("Article {article_id}"),
            author: "someone".to_string(),
            category: category.to_string(),
            subcategory: subcategory.map(str::to_string),
            file_path: "articles/x/2026-08/2026-08-05.md".to_string(),
            tags: vec!["Rust".to_string(), "CLI".to_string()],
            likes_count: likes,
            published_at: Utc.with_ymd_and_hms(2026, 8, 5, 9, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_exists() {
        let db = test_db().await;
        assert!(!db.article_exists("qiita", "a1").await.unwrap());

        let id = db
            .insert_article(&new_article("a1", "backend", Some("rust"), 10))
            .await
            .unwrap();
        assert!(id > 0);
        assert!(db.article_exists("qiita", "a1").await.unwrap());
        // Same id under a different source is a different identity
        assert!(!db.article_exists("zenn", "a1").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected_and_stats_credited_once() {
        let db = test_db().await;
        let article = new_article("123", "backend", Some("rust"), 10);

        db.insert_article(&article).await.unwrap();
        let err = db.insert_article(&article).await.unwrap_err();
        assert!(err.is_duplicate());
        match &err {
            StorageError::Duplicate { origin, article_id } => {
                assert_eq!(origin, "qiita");
                assert_eq!(article_id, "123");
            }
            other => panic!("Expected Duplicate, got {other:?}"),
        }
        assert_eq!(err.to_string(), "Article already recorded: qiita/123");

        let stats = db.stats_for("backend", Some("rust")).await.unwrap().unwrap();
        assert_eq!(stats.article_count, 1);
        assert_eq!(stats.total_likes, 10);
    }

    #[tokio::test]
    async fn test_stats_accumulate_per_bucket() {
        let db = test_db().await;
        db.insert_article(&new_article("a", "backend", Some("rust"), 10))
            .await
            .unwrap();
        db.insert_article(&new_article("b", "backend", Some("rust"), 5))
            .await
            .unwrap();
        db.insert_article(&new_article("c", "frontend", Some("react"), 7))
            .await
            .unwrap();

        let rust = db.stats_for("backend", Some("rust")).await.unwrap().unwrap();
        assert_eq!(rust.article_count, 2);
        assert_eq!(rust.total_likes, 15);

        let react = db.stats_for("frontend", Some("react")).await.unwrap().unwrap();
        assert_eq!(react.article_count, 1);
        assert_eq!(react.total_likes, 7);
    }

    #[tokio::test]
    async fn test_no_subcategory_bucket_uses_empty_sentinel() {
        let db = test_db().await;
        db.insert_article(&new_article("x", "other", None, 3))
            .await
            .unwrap();
        db.insert_article(&new_article("y", "other", None, 4))
            .await
            .unwrap();

        let stats = db.stats_for("other", None).await.unwrap().unwrap();
        assert_eq!(stats.article_count, 2);
        assert_eq!(stats.total_likes, 7);
        assert_eq!(stats.subcategory, None);
    }

    #[tokio::test]
    async fn test_recent_articles_ordered_and_roundtripped() {
        let db = test_db().await;
        let mut early = new_article("early", "backend", Some("rust"), 1);
        early.published_at = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        let mut late = new_article("late", "backend", Some("rust"), 2);
        late.published_at = Utc.with_ymd_and_hms(2026, 8, 9, 0, 0, 0).unwrap();

        db.insert_article(&early).await.unwrap();
        db.insert_article(&late).await.unwrap();

        let records = db.recent_articles("backend", Some("rust"), 10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].article_id, "late");
        assert_eq!(records[1].article_id, "early");
        assert_eq!(records[0].tags, ["Rust", "CLI"]);
        assert_eq!(records[0].subcategory.as_deref(), Some("rust"));
    }

    #[tokio::test]
    async fn test_labelled_buckets() {
        let db = test_db().await;
        db.insert_article(&new_article("a", "backend", Some("rust"), 0))
            .await
            .unwrap();
        db.insert_article(&new_article("b", "other", None, 0))
            .await
            .unwrap();

        let buckets = db.labelled_buckets().await.unwrap();
        assert_eq!(
            buckets,
            vec![
                ("backend".to_string(), Some("rust".to_string())),
                ("other".to_string(), None),
            ]
        );
    }
}
