use anyhow::Result;
use axum::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPool, postgres::PgPoolOptions, FromRow};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{NewReview, Review, Sentiment};
use crate::store::{CategoryCount, GroupField, GroupSentimentCount, MonthCount, ReviewStore, SentimentAccuracy};

pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn init_db(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reviews (
            id UUID PRIMARY KEY,
            category TEXT,
            product_name TEXT,
            review TEXT NOT NULL CHECK (length(btrim(review)) > 0),
            classification TEXT NOT NULL CHECK (classification IN ('Genuine', 'Fake', 'Spam')),
            sentiment TEXT NOT NULL CHECK (sentiment IN ('Positive', 'Negative', 'Neutral')),
            reason TEXT,
            accuracy DOUBLE PRECISION NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS reviews_created_at_idx ON reviews (created_at DESC);")
        .execute(pool)
        .await?;

    Ok(())
}

#[derive(Debug, FromRow)]
struct ReviewRow {
    id: Uuid,
    category: Option<String>,
    product_name: Option<String>,
    review: String,
    classification: String,
    sentiment: String,
    reason: Option<String>,
    accuracy: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = ApiError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        Ok(Review {
            id: row.id,
            category: row.category,
            product_name: row.product_name,
            review: row.review,
            classification: row.classification.parse().map_err(ApiError::Internal)?,
            sentiment: row.sentiment.parse().map_err(ApiError::Internal)?,
            reason: row.reason,
            accuracy: row.accuracy,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_reviews(rows: Vec<ReviewRow>) -> ApiResult<Vec<Review>> {
    rows.into_iter().map(Review::try_from).collect()
}

const REVIEW_COLUMNS: &str = "id, category, product_name, review, classification, sentiment, reason, accuracy, created_at, updated_at";

/// PostgreSQL-backed review store.
pub struct PgReviewStore {
    pool: PgPool,
}

impl PgReviewStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewStore for PgReviewStore {
    async fn create(&self, new_review: NewReview) -> ApiResult<Review> {
        new_review.check()?;
        let row: ReviewRow = sqlx::query_as(&format!(
            r#"INSERT INTO reviews (id, category, product_name, review, classification, sentiment, reason, accuracy)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING {}"#,
            REVIEW_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new_review.category)
        .bind(&new_review.product_name)
        .bind(&new_review.review)
        .bind(new_review.classification.as_str())
        .bind(new_review.sentiment.as_str())
        .bind(&new_review.reason)
        .bind(new_review.accuracy)
        .fetch_one(&self.pool)
        .await?;

        Review::try_from(row)
    }

    async fn list(&self) -> ApiResult<Vec<Review>> {
        let rows: Vec<ReviewRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reviews ORDER BY created_at DESC",
            REVIEW_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        into_reviews(rows)
    }

    async fn get_by_id(&self, id: Uuid) -> ApiResult<Option<Review>> {
        let row: Option<ReviewRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reviews WHERE id = $1",
            REVIEW_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Review::try_from).transpose()
    }

    async fn count_by_sentiment(&self) -> ApiResult<BTreeMap<Sentiment, i64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT sentiment, COUNT(*) FROM reviews GROUP BY sentiment")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(sentiment, count)| -> ApiResult<(Sentiment, i64)> {
                let sentiment: Sentiment = sentiment.parse().map_err(ApiError::Internal)?;
                Ok((sentiment, count))
            })
            .collect()
    }

    async fn count_by_month(&self, limit: usize) -> ApiResult<Vec<MonthCount>> {
        // Newest buckets first so LIMIT keeps the most recent ones, then flip.
        let rows: Vec<(i32, i32, i64)> = sqlx::query_as(
            r#"SELECT EXTRACT(YEAR FROM created_at AT TIME ZONE 'UTC')::INT AS year,
                      EXTRACT(MONTH FROM created_at AT TIME ZONE 'UTC')::INT AS month,
                      COUNT(*)
               FROM reviews
               GROUP BY 1, 2
               ORDER BY 1 DESC, 2 DESC
               LIMIT $1"#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .rev()
            .map(|(year, month, count)| MonthCount {
                year,
                month: month as u32,
                count,
            })
            .collect())
    }

    async fn count_by_category(&self) -> ApiResult<Vec<CategoryCount>> {
        let rows: Vec<(Option<String>, i64)> = sqlx::query_as(
            r#"SELECT category, COUNT(*) FROM reviews GROUP BY category ORDER BY category COLLATE "C" NULLS FIRST"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect())
    }

    async fn find_by_category_or_product(
        &self,
        category: Option<&str>,
        product: Option<&str>,
    ) -> ApiResult<Vec<Review>> {
        let rows: Vec<ReviewRow> = sqlx::query_as(&format!(
            r#"SELECT {} FROM reviews
               WHERE ($1::TEXT IS NULL OR category = $1)
                 AND ($2::TEXT IS NULL OR product_name = $2)
               ORDER BY created_at DESC"#,
            REVIEW_COLUMNS
        ))
        .bind(category)
        .bind(product)
        .fetch_all(&self.pool)
        .await?;
        into_reviews(rows)
    }

    async fn count_by_group_and_sentiment(&self, field: GroupField) -> ApiResult<Vec<GroupSentimentCount>> {
        // Byte-order collation and enum order for sentiment, as in the memory store.
        let rows: Vec<(Option<String>, String, i64)> = sqlx::query_as(&format!(
            r#"SELECT {col}, sentiment, COUNT(*) FROM reviews
               GROUP BY {col}, sentiment
               ORDER BY {col} COLLATE "C" NULLS FIRST,
                        CASE sentiment WHEN 'Positive' THEN 0 WHEN 'Negative' THEN 1 ELSE 2 END"#,
            col = field.column()
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(group, sentiment, count)| -> ApiResult<GroupSentimentCount> {
                let sentiment: Sentiment = sentiment.parse().map_err(ApiError::Internal)?;
                Ok(GroupSentimentCount { group, sentiment, count })
            })
            .collect()
    }

    async fn sentiment_accuracy(
        &self,
        category: Option<&str>,
        product: Option<&str>,
    ) -> ApiResult<Vec<SentimentAccuracy>> {
        let rows: Vec<(String, i64, f64)> = sqlx::query_as(
            r#"SELECT sentiment, COUNT(*), SUM(accuracy)
               FROM reviews
               WHERE ($1::TEXT IS NULL OR category = $1)
                 AND ($2::TEXT IS NULL OR product_name = $2)
               GROUP BY sentiment"#,
        )
        .bind(category)
        .bind(product)
        .fetch_all(&self.pool)
        .await?;

        let mut totals = rows
            .into_iter()
            .map(|(sentiment, count, accuracy_sum)| -> ApiResult<SentimentAccuracy> {
                let sentiment: Sentiment = sentiment.parse().map_err(ApiError::Internal)?;
                Ok(SentimentAccuracy { sentiment, count, accuracy_sum })
            })
            .collect::<ApiResult<Vec<_>>>()?;
        totals.sort_by_key(|t| t.sentiment);
        Ok(totals)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
