use super::schema::Database;
use super::types::{
    sql_to_subcategory, subcategory_to_sql, timestamp_to_datetime, CategoryStats, StorageError,
};

type StatsRow = (String, String, i64, i64, i64);

fn row_to_stats((category, subcategory, article_count, total_likes, last_updated): StatsRow) -> CategoryStats {
    CategoryStats {
        category,
        subcategory: sql_to_subcategory(subcategory),
        article_count,
        total_likes,
        last_updated: timestamp_to_datetime(last_updated),
    }
}

impl Database {
    // ========================================================================
    // Statistics
    // ========================================================================

    /// Committed statistics for one bucket, or `None` if it was never
    /// touched.
    pub async fn stats_for(
        &self,
        category: &str,
        subcategory: Option<&str>,
    ) -> Result<Option<CategoryStats>, StorageError> {
        let row: Option<StatsRow> = sqlx::query_as(
            "SELECT category, subcategory, article_count, total_likes, last_updated \
             FROM category_stats WHERE category = ? AND subcategory = ?",
        )
        .bind(category)
        .bind(subcategory_to_sql(subcategory))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_stats))
    }

    /// All buckets with committed statistics, in key order.
    pub async fn stats_snapshot(&self) -> Result<Vec<CategoryStats>, StorageError> {
        let rows: Vec<StatsRow> = sqlx::query_as(
            "SELECT category, subcategory, article_count, total_likes, last_updated \
             FROM category_stats ORDER BY category, subcategory",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_stats).collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
