//! Review record and the payloads that create it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;

/// Authenticity judgement attached to a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
pub enum Classification {
    Genuine,
    Fake,
    /// Only produced by the keyword analyzer's promotional-content check.
    Spam,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Genuine => "Genuine",
            Classification::Fake => "Fake",
            Classification::Spam => "Spam",
        }
    }
}

impl FromStr for Classification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Genuine" => Ok(Classification::Genuine),
            "Fake" => Ok(Classification::Fake),
            "Spam" => Ok(Classification::Spam),
            other => Err(format!("unknown classification: {}", other)),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tone of a review. Ordering drives the order of the sentiment chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Negative => "Negative",
            Sentiment::Neutral => "Neutral",
        }
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Positive" => Ok(Sentiment::Positive),
            "Negative" => Ok(Sentiment::Negative),
            "Neutral" => Ok(Sentiment::Neutral),
            other => Err(format!("unknown sentiment: {}", other)),
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored feedback submission. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    #[schema(example = "Electronics")]
    pub category: Option<String>,
    #[schema(example = "Acme Headphones")]
    pub product_name: Option<String>,
    #[schema(example = "This product is amazing and great")]
    pub review: String,
    pub classification: Classification,
    pub sentiment: Sentiment,
    pub reason: Option<String>,
    #[schema(example = 84.0)]
    pub accuracy: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a record about to be stored; id and timestamps come from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub category: Option<String>,
    pub product_name: Option<String>,
    pub review: String,
    pub classification: Classification,
    pub sentiment: Sentiment,
    pub reason: Option<String>,
    pub accuracy: f64,
}

impl NewReview {
    /// Checks the invariants every stored record must hold.
    pub fn check(&self) -> Result<(), ApiError> {
        if self.review.trim().is_empty() {
            return Err(ApiError::Validation("Review text is required".to_string()));
        }
        if !self.accuracy.is_finite() {
            return Err(ApiError::Validation("accuracy must be a finite number".to_string()));
        }
        Ok(())
    }

    pub fn into_review(self, id: Uuid, now: DateTime<Utc>) -> Review {
        Review {
            id,
            category: self.category,
            product_name: self.product_name,
            review: self.review,
            classification: self.classification,
            sentiment: self.sentiment,
            reason: self.reason,
            accuracy: self.accuracy,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Body of `POST /api/reviews`. Everything is optional on the wire so that
/// missing fields surface as validation messages rather than parse failures.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDraft {
    pub category: Option<String>,
    pub product_name: Option<String>,
    pub review: Option<String>,
    #[schema(example = "Genuine")]
    pub classification: Option<String>,
    #[schema(example = "Positive")]
    pub sentiment: Option<String>,
    pub reason: Option<String>,
    /// Number or numeric string.
    #[schema(value_type = f64, example = 92.5)]
    pub accuracy: Option<serde_json::Value>,
}

impl ReviewDraft {
    pub fn validate(self) -> Result<NewReview, ApiError> {
        let review = submitted_text(self.review)
            .ok_or_else(|| ApiError::Validation("Review text is required".to_string()))?;

        // Direct creation only accepts the two persisted authenticity labels.
        let classification = match self.classification.as_deref() {
            Some("Genuine") => Classification::Genuine,
            Some("Fake") => Classification::Fake,
            Some(other) => {
                return Err(ApiError::Validation(format!(
                    "classification must be one of Genuine, Fake (got {})",
                    other
                )))
            }
            None => return Err(ApiError::Validation("classification is required".to_string())),
        };

        let sentiment = match self.sentiment.as_deref() {
            Some(s) => s.parse::<Sentiment>().map_err(|_| {
                ApiError::Validation(format!(
                    "sentiment must be one of Positive, Negative, Neutral (got {})",
                    s
                ))
            })?,
            None => return Err(ApiError::Validation("sentiment is required".to_string())),
        };

        let accuracy = match self.accuracy {
            Some(value) => parse_accuracy(&value)?,
            None => return Err(ApiError::Validation("accuracy is required".to_string())),
        };

        let new_review = NewReview {
            category: non_blank(self.category),
            product_name: non_blank(self.product_name),
            review,
            classification,
            sentiment,
            reason: non_blank(self.reason),
            accuracy,
        };
        new_review.check()?;
        Ok(new_review)
    }
}

fn parse_accuracy(value: &serde_json::Value) -> Result<f64, ApiError> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|a| a.is_finite())
        .ok_or_else(|| ApiError::Validation("accuracy must be numeric".to_string()))
}

/// Trims and drops empty strings, so blank form fields are stored as `null`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Feedback text exactly as submitted, or `None` when it is blank.
pub fn submitted_text(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
