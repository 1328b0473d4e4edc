//! Client for the remotely hosted review classification model.
//!
//! The endpoint serves two tasks behind one URL, picked by `fn_index`:
//! 0 predicts sentiment, 1 predicts authenticity. Both are asked in parallel
//! and merged into a single verdict; any failure fails the whole call.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::models::{Classification, Sentiment};

const SENTIMENT_TASK: u8 = 0;
const CLASSIFICATION_TASK: u8 = 1;

/// Sentiment task label meaning negative
pub const NEGATIVE_LABEL: &str = "LABEL_0";
/// Classification task label meaning genuine
pub const GENUINE_LABEL: &str = "LABEL_1";

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    data: [&'a str; 1],
    fn_index: u8,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    data: Vec<Value>,
}

/// One task's answer
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Prediction {
    pub label: Option<String>,
    pub confidence: f64,
}

impl Prediction {
    /// Reads `predicted_label` and `confidence` from a `data[0]` entry.
    /// Missing or unusable fields fall back to `None` / `0`.
    fn from_entry(entry: Option<&Value>) -> Self {
        let label = entry
            .and_then(|e| e.get("predicted_label"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from);

        let confidence = entry
            .and_then(|e| e.get("confidence"))
            .and_then(|c| match c {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            })
            .filter(|c| c.is_finite())
            .unwrap_or(0.0);

        Self { label, confidence }
    }
}

/// Merged result of both tasks
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierVerdict {
    pub classification: Classification,
    /// Never `Neutral`; the remote model only separates negative from the rest.
    pub sentiment: Sentiment,
    /// Mean confidence, 4 decimal places
    pub accuracy: f64,
}

pub fn merge(sentiment: &Prediction, classification: &Prediction) -> ClassifierVerdict {
    let verdict_classification = if classification.label.as_deref() == Some(GENUINE_LABEL) {
        Classification::Genuine
    } else {
        Classification::Fake
    };
    let verdict_sentiment = if sentiment.label.as_deref() == Some(NEGATIVE_LABEL) {
        Sentiment::Negative
    } else {
        Sentiment::Positive
    };
    let mean = (sentiment.confidence + classification.confidence) / 2.0;

    ClassifierVerdict {
        classification: verdict_classification,
        sentiment: verdict_sentiment,
        accuracy: (mean * 10_000.0).round() / 10_000.0,
    }
}

#[derive(Clone)]
pub struct ClassifierClient {
    http: reqwest::Client,
    endpoint: Option<String>,
    timeout: Duration,
}

impl ClassifierClient {
    pub fn new(endpoint: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint,
            timeout,
        })
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub async fn classify(&self, review: &str) -> ApiResult<ClassifierVerdict> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| ApiError::Upstream("classifier endpoint is not configured".to_string()))?;

        let (sentiment, classification) = tokio::try_join!(
            self.predict(endpoint, review, SENTIMENT_TASK),
            self.predict(endpoint, review, CLASSIFICATION_TASK),
        )?;
        debug!(?sentiment, ?classification, "classifier predictions");

        let verdict = merge(&sentiment, &classification);
        info!(
            "🧠 [Classifier] {} / {} (accuracy {:.4})",
            verdict.classification, verdict.sentiment, verdict.accuracy
        );
        Ok(verdict)
    }

    async fn predict(&self, endpoint: &str, review: &str, fn_index: u8) -> ApiResult<Prediction> {
        let response = self
            .http
            .post(endpoint)
            .json(&PredictRequest {
                data: [review],
                fn_index,
            })
            .send()
            .await
            .map_err(|e| self.transport_error(fn_index, e))?;

        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "task {} answered {}",
                fn_index,
                response.status()
            )));
        }

        let body: PredictResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(fn_index, e))?;

        Ok(Prediction::from_entry(body.data.first()))
    }

    fn transport_error(&self, fn_index: u8, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Upstream(format!("task {} timed out after {:?}", fn_index, self.timeout))
        } else if err.is_decode() {
            ApiError::Upstream(format!("task {} returned an unreadable body: {}", fn_index, err))
        } else {
            ApiError::Upstream(format!("task {} request failed: {}", fn_index, err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prediction(label: &str, confidence: f64) -> Prediction {
        Prediction {
            label: Some(label.to_string()),
            confidence,
        }
    }

    #[test]
    fn test_genuine_negative() {
        let verdict = merge(&prediction("LABEL_0", 0.9), &prediction("LABEL_1", 0.8));
        assert_eq!(verdict.classification, Classification::Genuine);
        assert_eq!(verdict.sentiment, Sentiment::Negative);
        assert_eq!(verdict.accuracy, 0.85);
    }

    #[test]
    fn test_fake_positive_for_other_labels() {
        let verdict = merge(&prediction("LABEL_1", 0.5), &prediction("LABEL_0", 0.5));
        assert_eq!(verdict.classification, Classification::Fake);
        assert_eq!(verdict.sentiment, Sentiment::Positive);

        let verdict = merge(&Prediction::default(), &Prediction::default());
        assert_eq!(verdict.classification, Classification::Fake);
        assert_eq!(verdict.sentiment, Sentiment::Positive);
        assert_eq!(verdict.accuracy, 0.0);
    }

    #[test]
    fn test_accuracy_rounded_to_four_places() {
        let verdict = merge(&prediction("LABEL_1", 0.912345), &prediction("LABEL_1", 0.7));
        assert_eq!(verdict.accuracy, 0.8062);
    }

    #[test]
    fn test_prediction_parsing() {
        let entry = json!({"predicted_label": "LABEL_1", "confidence": "0.93"});
        assert_eq!(Prediction::from_entry(Some(&entry)), prediction("LABEL_1", 0.93));

        let entry = json!({"predicted_label": "LABEL_0", "confidence": 0.61});
        assert_eq!(Prediction::from_entry(Some(&entry)), prediction("LABEL_0", 0.61));

        let entry = json!({"confidence": "n/a"});
        assert_eq!(Prediction::from_entry(Some(&entry)), Prediction::default());
        assert_eq!(Prediction::from_entry(None), Prediction::default());
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(PredictRequest {
            data: ["nice"],
            fn_index: 1,
        })
        .unwrap();
        assert_eq!(body, json!({"data": ["nice"], "fn_index": 1}));
    }

    #[tokio::test]
    async fn test_unconfigured_endpoint_is_upstream_error() {
        let client = ClassifierClient::new(None, Duration::from_secs(1)).unwrap();
        assert!(matches!(client.classify("hello").await, Err(ApiError::Upstream(_))));
    }
}
