//! Review storage seam.
//!
//! Handlers only see [`ReviewStore`]; the PostgreSQL implementation lives in
//! `db.rs` and [`MemoryReviewStore`] backs tests and database-less local runs.

use axum::async_trait;
use chrono::{Datelike, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::RwLock;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{NewReview, Review, Sentiment};

/// Number of month buckets shown on the trend chart
pub const TREND_MONTHS: usize = 6;

/// Review count for one calendar month (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MonthCount {
    pub year: i32,
    /// 1-based
    pub month: u32,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CategoryCount {
    pub category: Option<String>,
    pub count: i64,
}

/// Optional record field reviews are grouped by in breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupField {
    Category,
    Product,
}

impl GroupField {
    pub fn column(self) -> &'static str {
        match self {
            GroupField::Category => "category",
            GroupField::Product => "product_name",
        }
    }

    pub fn value(self, review: &Review) -> Option<&str> {
        match self {
            GroupField::Category => review.category.as_deref(),
            GroupField::Product => review.product_name.as_deref(),
        }
    }
}

/// Reviews with one sentiment within one category or product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSentimentCount {
    pub group: Option<String>,
    pub sentiment: Sentiment,
    pub count: i64,
}

/// Count and summed accuracy of the reviews with one sentiment.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentAccuracy {
    pub sentiment: Sentiment,
    pub count: i64,
    pub accuracy_sum: f64,
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn create(&self, new_review: NewReview) -> ApiResult<Review>;

    /// All records, newest first.
    async fn list(&self) -> ApiResult<Vec<Review>>;

    async fn get_by_id(&self, id: Uuid) -> ApiResult<Option<Review>>;

    async fn count_by_sentiment(&self) -> ApiResult<BTreeMap<Sentiment, i64>>;

    /// The most recent `limit` month buckets, oldest first.
    async fn count_by_month(&self, limit: usize) -> ApiResult<Vec<MonthCount>>;

    /// Counts per category, `None` (uncategorized) first, then by byte order.
    async fn count_by_category(&self) -> ApiResult<Vec<CategoryCount>>;

    /// Sentiment counts per group value, ordered by group like
    /// [`ReviewStore::count_by_category`]. Groups with no reviews are absent.
    async fn count_by_group_and_sentiment(&self, field: GroupField) -> ApiResult<Vec<GroupSentimentCount>>;

    /// Per-sentiment count and accuracy sum over the records matching the
    /// exact filters (all records when neither is given).
    async fn sentiment_accuracy(
        &self,
        category: Option<&str>,
        product: Option<&str>,
    ) -> ApiResult<Vec<SentimentAccuracy>>;

    /// Exact-match filter; both filters must hold when both are given.
    async fn find_by_category_or_product(
        &self,
        category: Option<&str>,
        product: Option<&str>,
    ) -> ApiResult<Vec<Review>>;

    /// Short label for health output and logs.
    fn backend(&self) -> &'static str;
}

/// Process-local store. Records are kept in insertion order.
#[derive(Default)]
pub struct MemoryReviewStore {
    records: RwLock<Vec<Review>>,
}

impl MemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-built records as-is, keeping their ids and timestamps.
    pub fn with_records(records: Vec<Review>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    fn read(&self) -> ApiResult<std::sync::RwLockReadGuard<'_, Vec<Review>>> {
        self.records
            .read()
            .map_err(|_| ApiError::Internal("review store lock poisoned".to_string()))
    }
}

fn matches_filters(review: &Review, category: Option<&str>, product: Option<&str>) -> bool {
    category.map_or(true, |c| review.category.as_deref() == Some(c))
        && product.map_or(true, |p| review.product_name.as_deref() == Some(p))
}

fn newest_first(mut reviews: Vec<Review>) -> Vec<Review> {
    reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    reviews
}

#[async_trait]
impl ReviewStore for MemoryReviewStore {
    async fn create(&self, new_review: NewReview) -> ApiResult<Review> {
        new_review.check()?;
        let review = new_review.into_review(Uuid::new_v4(), Utc::now());
        self.records
            .write()
            .map_err(|_| ApiError::Internal("review store lock poisoned".to_string()))?
            .push(review.clone());
        Ok(review)
    }

    async fn list(&self) -> ApiResult<Vec<Review>> {
        Ok(newest_first(self.read()?.clone()))
    }

    async fn get_by_id(&self, id: Uuid) -> ApiResult<Option<Review>> {
        Ok(self.read()?.iter().find(|r| r.id == id).cloned())
    }

    async fn count_by_sentiment(&self) -> ApiResult<BTreeMap<Sentiment, i64>> {
        let mut counts = BTreeMap::new();
        for review in self.read()?.iter() {
            *counts.entry(review.sentiment).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn count_by_month(&self, limit: usize) -> ApiResult<Vec<MonthCount>> {
        let mut buckets: BTreeMap<(i32, u32), i64> = BTreeMap::new();
        for review in self.read()?.iter() {
            let key = (review.created_at.year(), review.created_at.month());
            *buckets.entry(key).or_insert(0) += 1;
        }
        let skip = buckets.len().saturating_sub(limit);
        Ok(buckets
            .into_iter()
            .skip(skip)
            .map(|((year, month), count)| MonthCount { year, month, count })
            .collect())
    }

    async fn count_by_category(&self) -> ApiResult<Vec<CategoryCount>> {
        let mut counts: BTreeMap<Option<String>, i64> = BTreeMap::new();
        for review in self.read()?.iter() {
            *counts.entry(review.category.clone()).or_insert(0) += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect())
    }

    async fn find_by_category_or_product(
        &self,
        category: Option<&str>,
        product: Option<&str>,
    ) -> ApiResult<Vec<Review>> {
        let matches = self
            .read()?
            .iter()
            .filter(|r| matches_filters(r, category, product))
            .cloned()
            .collect();
        Ok(newest_first(matches))
    }

    async fn count_by_group_and_sentiment(&self, field: GroupField) -> ApiResult<Vec<GroupSentimentCount>> {
        let mut counts: BTreeMap<(Option<String>, Sentiment), i64> = BTreeMap::new();
        for review in self.read()?.iter() {
            let key = (field.value(review).map(String::from), review.sentiment);
            *counts.entry(key).or_insert(0) += 1;
        }
        Ok(counts
            .into_iter()
            .map(|((group, sentiment), count)| GroupSentimentCount { group, sentiment, count })
            .collect())
    }

    async fn sentiment_accuracy(
        &self,
        category: Option<&str>,
        product: Option<&str>,
    ) -> ApiResult<Vec<SentimentAccuracy>> {
        let mut totals: BTreeMap<Sentiment, (i64, f64)> = BTreeMap::new();
        for review in self.read()?.iter().filter(|r| matches_filters(r, category, product)) {
            let entry = totals.entry(review.sentiment).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += review.accuracy;
        }
        Ok(totals
            .into_iter()
            .map(|(sentiment, (count, accuracy_sum))| SentimentAccuracy { sentiment, count, accuracy_sum })
            .collect())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Classification;
    use chrono::{TimeZone, Utc};

    fn new_review(text: &str, sentiment: Sentiment, category: Option<&str>, product: Option<&str>) -> NewReview {
        NewReview {
            category: category.map(String::from),
            product_name: product.map(String::from),
            review: text.to_string(),
            classification: Classification::Genuine,
            sentiment,
            reason: None,
            accuracy: 80.0,
        }
    }

    fn dated(year: i32, month: u32, day: u32) -> Review {
        new_review("dated", Sentiment::Neutral, None, None)
            .into_review(Uuid::new_v4(), Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_timestamps() {
        let store = MemoryReviewStore::new();
        let review = store
            .create(new_review("Works well", Sentiment::Positive, None, None))
            .await
            .unwrap();
        assert_eq!(review.created_at, review.updated_at);
        assert_eq!(store.get_by_id(review.id).await.unwrap(), Some(review));
        assert_eq!(store.get_by_id(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_text_and_nan_accuracy() {
        let store = MemoryReviewStore::new();
        let empty = new_review("  ", Sentiment::Positive, None, None);
        assert!(matches!(store.create(empty).await, Err(ApiError::Validation(_))));

        let mut nan = new_review("text", Sentiment::Positive, None, None);
        nan.accuracy = f64::NAN;
        assert!(matches!(store.create(nan).await, Err(ApiError::Validation(_))));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = MemoryReviewStore::with_records(vec![dated(2024, 1, 5), dated(2024, 3, 1), dated(2023, 12, 31)]);
        let listed = store.list().await.unwrap();
        let times: Vec<_> = listed.iter().map(|r| r.created_at).collect();
        let mut sorted = times.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(times, sorted);
    }

    #[tokio::test]
    async fn test_sentiment_counts_sum_to_total() {
        let store = MemoryReviewStore::new();
        for (text, sentiment) in [
            ("a", Sentiment::Positive),
            ("b", Sentiment::Positive),
            ("c", Sentiment::Negative),
            ("d", Sentiment::Neutral),
        ] {
            store.create(new_review(text, sentiment, None, None)).await.unwrap();
        }
        let counts = store.count_by_sentiment().await.unwrap();
        assert_eq!(counts[&Sentiment::Positive], 2);
        assert_eq!(counts.values().sum::<i64>(), 4);
    }

    #[tokio::test]
    async fn test_month_counts_keep_most_recent_buckets() {
        let mut records = Vec::new();
        for month in 1..=8 {
            records.push(dated(2024, month, 10));
        }
        records.push(dated(2024, 8, 20));
        records.push(dated(2023, 11, 2));
        let store = MemoryReviewStore::with_records(records);

        let months = store.count_by_month(TREND_MONTHS).await.unwrap();
        assert_eq!(months.len(), 6);
        assert_eq!((months[0].year, months[0].month), (2024, 3));
        assert_eq!(months.last().map(|m| (m.month, m.count)), Some((8, 2)));
        assert!(months.windows(2).all(|w| (w[0].year, w[0].month) < (w[1].year, w[1].month)));
    }

    #[tokio::test]
    async fn test_month_counts_fewer_than_limit() {
        let store = MemoryReviewStore::with_records(vec![dated(2023, 12, 1), dated(2024, 1, 1)]);
        let months = store.count_by_month(TREND_MONTHS).await.unwrap();
        assert_eq!(months.len(), 2);
        assert_eq!((months[0].year, months[0].month), (2023, 12));
    }

    #[tokio::test]
    async fn test_category_counts_include_uncategorized() {
        let store = MemoryReviewStore::new();
        store.create(new_review("a", Sentiment::Positive, Some("Books"), None)).await.unwrap();
        store.create(new_review("b", Sentiment::Positive, Some("Books"), None)).await.unwrap();
        store.create(new_review("c", Sentiment::Positive, None, None)).await.unwrap();
        let counts = store.count_by_category().await.unwrap();
        assert_eq!(
            counts,
            vec![
                CategoryCount { category: None, count: 1 },
                CategoryCount { category: Some("Books".to_string()), count: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn test_category_order_is_bytewise() {
        let store = MemoryReviewStore::new();
        for category in [Some("apple"), Some("Zebra"), None, Some("Apple")] {
            store.create(new_review("x", Sentiment::Neutral, category, None)).await.unwrap();
        }
        let order: Vec<_> = store
            .count_by_category()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.category)
            .collect();
        assert_eq!(
            order,
            vec![None, Some("Apple".to_string()), Some("Zebra".to_string()), Some("apple".to_string())]
        );
    }

    #[tokio::test]
    async fn test_group_sentiment_counts() {
        let store = MemoryReviewStore::new();
        store.create(new_review("a", Sentiment::Positive, Some("Audio"), Some("Buds"))).await.unwrap();
        store.create(new_review("b", Sentiment::Negative, Some("Audio"), Some("Buds"))).await.unwrap();
        store.create(new_review("c", Sentiment::Positive, Some("Audio"), None)).await.unwrap();

        let by_category = store.count_by_group_and_sentiment(GroupField::Category).await.unwrap();
        assert_eq!(by_category.len(), 2);
        assert!(by_category.iter().all(|c| c.group.as_deref() == Some("Audio")));
        assert_eq!(by_category.iter().map(|c| c.count).sum::<i64>(), 3);

        let by_product = store.count_by_group_and_sentiment(GroupField::Product).await.unwrap();
        assert_eq!(
            by_product[0],
            GroupSentimentCount { group: None, sentiment: Sentiment::Positive, count: 1 }
        );
        assert_eq!(by_product.len(), 3);
    }

    #[tokio::test]
    async fn test_sentiment_accuracy_respects_filters() {
        let store = MemoryReviewStore::new();
        let mut high = new_review("a", Sentiment::Positive, Some("Audio"), Some("Buds"));
        high.accuracy = 90.0;
        store.create(high).await.unwrap();
        store.create(new_review("b", Sentiment::Positive, Some("Audio"), None)).await.unwrap();
        store.create(new_review("c", Sentiment::Negative, Some("Books"), None)).await.unwrap();

        let audio = store.sentiment_accuracy(Some("Audio"), None).await.unwrap();
        assert_eq!(
            audio,
            vec![SentimentAccuracy { sentiment: Sentiment::Positive, count: 2, accuracy_sum: 170.0 }]
        );
        let all = store.sentiment_accuracy(None, None).await.unwrap();
        assert_eq!(all.iter().map(|s| s.count).sum::<i64>(), 3);
        assert!(store.sentiment_accuracy(None, Some("Nope")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_by_category_or_product() {
        let store = MemoryReviewStore::new();
        store.create(new_review("a", Sentiment::Positive, Some("Audio"), Some("Buds"))).await.unwrap();
        store.create(new_review("b", Sentiment::Positive, Some("Audio"), Some("Speaker"))).await.unwrap();
        store.create(new_review("c", Sentiment::Positive, Some("Books"), None)).await.unwrap();

        assert_eq!(store.find_by_category_or_product(Some("Audio"), None).await.unwrap().len(), 2);
        assert_eq!(store.find_by_category_or_product(None, Some("Buds")).await.unwrap().len(), 1);
        assert_eq!(store.find_by_category_or_product(Some("Books"), Some("Buds")).await.unwrap().len(), 0);
        assert_eq!(store.find_by_category_or_product(Some("audio"), None).await.unwrap().len(), 0);
        assert_eq!(store.find_by_category_or_product(None, None).await.unwrap().len(), 3);
    }
}
