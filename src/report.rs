//! Chart-ready views over review aggregates. Nothing is cached; every call
//! reads the store again.

use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::analyzer::AspectScore;
use crate::error::ApiResult;
use crate::models::{Review, Sentiment};
use crate::store::{
    CategoryCount, GroupField, GroupSentimentCount, MonthCount, ReviewStore, SentimentAccuracy, TREND_MONTHS,
};

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const POSITIVE_COLOR: &str = "#22c55e";
const NEGATIVE_COLOR: &str = "#ef4444";
const OTHER_COLOR: &str = "#94a3b8";

/// One pie slice
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SentimentSlice {
    #[schema(example = "Positive")]
    pub name: Sentiment,
    pub value: i64,
    #[schema(example = "#22c55e")]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TrendPoint {
    #[schema(example = "Mar")]
    pub month: String,
    pub value: i64,
}

/// Sentiment mix of one category or product, in whole percent of its reviews.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GroupBreakdown {
    /// `null` collects reviews without a value
    pub name: Option<String>,
    pub total: i64,
    pub positive: i64,
    pub neutral: i64,
    pub negative: i64,
}

/// Visualization summary. The headline percentages and average accuracy
/// cover the filtered reviews; the group lists always cover every review.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SentimentBreakdown {
    pub total: i64,
    pub positive: i64,
    pub neutral: i64,
    pub negative: i64,
    #[schema(example = 81.5)]
    pub average_accuracy: f64,
    pub categories: Vec<GroupBreakdown>,
    pub products: Vec<GroupBreakdown>,
}

/// Response of the keyword analysis endpoint
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub review: Review,
    pub sentiment_data: Vec<SentimentSlice>,
    pub aspect_data: Vec<AspectScore>,
    pub trend_data: Vec<TrendPoint>,
    pub key_phrases: Vec<String>,
}

fn color_for(sentiment: Sentiment) -> &'static str {
    match sentiment {
        Sentiment::Positive => POSITIVE_COLOR,
        Sentiment::Negative => NEGATIVE_COLOR,
        _ => OTHER_COLOR,
    }
}

pub fn sentiment_view(counts: &BTreeMap<Sentiment, i64>) -> Vec<SentimentSlice> {
    counts
        .iter()
        .map(|(&sentiment, &value)| SentimentSlice {
            name: sentiment,
            value,
            color: color_for(sentiment).to_string(),
        })
        .collect()
}

pub fn trend_view(months: &[MonthCount]) -> Vec<TrendPoint> {
    months
        .iter()
        .filter_map(|bucket| {
            let name = MONTH_NAMES.get(bucket.month.checked_sub(1)? as usize)?;
            Some(TrendPoint {
                month: name.to_string(),
                value: bucket.count,
            })
        })
        .collect()
}

pub async fn sentiment_data(store: &dyn ReviewStore) -> ApiResult<Vec<SentimentSlice>> {
    Ok(sentiment_view(&store.count_by_sentiment().await?))
}

pub async fn trend_data(store: &dyn ReviewStore) -> ApiResult<Vec<TrendPoint>> {
    Ok(trend_view(&store.count_by_month(TREND_MONTHS).await?))
}

/// Category bars are passed through unlabeled.
pub async fn category_data(store: &dyn ReviewStore) -> ApiResult<Vec<CategoryCount>> {
    store.count_by_category().await
}

fn percent(part: i64, total: i64) -> i64 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round() as i64
}

/// Total plus each sentiment's rounded share. Shares are rounded
/// independently and need not add up to 100.
fn shares(tally: &BTreeMap<Sentiment, i64>) -> (i64, i64, i64, i64) {
    let total: i64 = tally.values().sum();
    let share = |sentiment: Sentiment| percent(tally.get(&sentiment).copied().unwrap_or(0), total);
    (
        total,
        share(Sentiment::Positive),
        share(Sentiment::Neutral),
        share(Sentiment::Negative),
    )
}

/// Folds group-ordered sentiment counts into one entry per group.
pub fn group_view(counts: &[GroupSentimentCount]) -> Vec<GroupBreakdown> {
    let mut groups: Vec<(Option<String>, BTreeMap<Sentiment, i64>)> = Vec::new();
    for row in counts {
        match groups.last_mut() {
            Some((name, tally)) if *name == row.group => {
                *tally.entry(row.sentiment).or_insert(0) += row.count;
            }
            _ => groups.push((row.group.clone(), BTreeMap::from([(row.sentiment, row.count)]))),
        }
    }

    groups
        .into_iter()
        .map(|(name, tally)| {
            let (total, positive, neutral, negative) = shares(&tally);
            GroupBreakdown {
                name,
                total,
                positive,
                neutral,
                negative,
            }
        })
        .collect()
}

pub fn breakdown_view(
    filtered: &[SentimentAccuracy],
    categories: Vec<GroupBreakdown>,
    products: Vec<GroupBreakdown>,
) -> SentimentBreakdown {
    let tally: BTreeMap<Sentiment, i64> = filtered.iter().map(|s| (s.sentiment, s.count)).collect();
    let (total, positive, neutral, negative) = shares(&tally);
    let accuracy_sum: f64 = filtered.iter().map(|s| s.accuracy_sum).sum();
    let average_accuracy = if total == 0 {
        0.0
    } else {
        (accuracy_sum / total as f64 * 100.0).round() / 100.0
    };

    SentimentBreakdown {
        total,
        positive,
        neutral,
        negative,
        average_accuracy,
        categories,
        products,
    }
}

pub async fn breakdown_data(
    store: &dyn ReviewStore,
    category: Option<&str>,
    product: Option<&str>,
) -> ApiResult<SentimentBreakdown> {
    let filtered = store.sentiment_accuracy(category, product).await?;
    let categories = group_view(&store.count_by_group_and_sentiment(GroupField::Category).await?);
    let products = group_view(&store.count_by_group_and_sentiment(GroupField::Product).await?);
    Ok(breakdown_view(&filtered, categories, products))
}
