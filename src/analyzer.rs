//! Keyword-based feedback analysis.
//!
//! Sentiment comes from fixed positive/negative word lists, spam detection
//! from promotional phrases. Accuracy and aspect scores draw from a caller
//! supplied RNG so a seeded generator makes them reproducible.

use once_cell::sync::Lazy;
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;
use utoipa::ToSchema;

use crate::models::{Classification, Review, Sentiment};

static POSITIVE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["good", "great", "excellent", "amazing", "love", "like", "best"]
        .into_iter()
        .collect()
});

static NEGATIVE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["bad", "poor", "terrible", "worst", "hate", "dislike", "awful"]
        .into_iter()
        .collect()
});

// Matched as substrings of the whole text, not as tokens.
const SPAM_PHRASES: [&str; 6] = ["buy now", "click here", "free", "discount", "offer", "limited time"];

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "with", "by"]
        .into_iter()
        .collect()
});

const MAX_KEY_PHRASES: usize = 5;

pub const ASPECTS: [&str; 4] = ["Quality", "Price", "Support", "Usability"];

/// Result of analyzing one piece of feedback
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HeuristicAnalysis {
    pub sentiment: Sentiment,
    pub classification: Classification,
    pub reason: String,
    /// Integer in [70, 90)
    pub accuracy: f64,
    pub key_phrases: Vec<String>,
}

/// Per-aspect sentiment split in whole percent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AspectScore {
    #[schema(example = "Quality")]
    pub name: String,
    pub positive: u32,
    pub neutral: u32,
    pub negative: u32,
}

pub fn analyze<R: Rng + ?Sized>(text: &str, rng: &mut R) -> HeuristicAnalysis {
    let lowercase_text = text.to_lowercase();
    let words: Vec<&str> = lowercase_text.split_whitespace().collect();

    let sentiment = score_sentiment(&words);
    let classification = if is_spam(&lowercase_text) {
        Classification::Spam
    } else {
        Classification::Genuine
    };

    HeuristicAnalysis {
        sentiment,
        classification,
        reason: reason_for(classification, sentiment),
        accuracy: f64::from(rng.gen_range(70u32..90)),
        key_phrases: key_phrases(&words),
    }
}

fn score_sentiment(words: &[&str]) -> Sentiment {
    let positive_count = words.iter().filter(|w| POSITIVE_WORDS.contains(*w)).count();
    let negative_count = words.iter().filter(|w| NEGATIVE_WORDS.contains(*w)).count();

    if positive_count > negative_count {
        Sentiment::Positive
    } else if negative_count > positive_count {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

fn is_spam(lowercase_text: &str) -> bool {
    SPAM_PHRASES.iter().any(|phrase| lowercase_text.contains(phrase))
}

fn reason_for(classification: Classification, sentiment: Sentiment) -> String {
    if classification == Classification::Spam {
        "This feedback contains potentially promotional content or spam patterns.".to_string()
    } else {
        format!(
            "This feedback appears to be a genuine user experience with {} sentiment.",
            sentiment.as_str().to_lowercase()
        )
    }
}

fn key_phrases(words: &[&str]) -> Vec<String> {
    let mut phrases: Vec<String> = Vec::new();
    for word in words {
        if phrases.len() == MAX_KEY_PHRASES {
            break;
        }
        if word.chars().count() > 3
            && !STOP_WORDS.contains(word)
            && !phrases.iter().any(|p| p == word)
        {
            phrases.push(word.to_string());
        }
    }
    phrases
}

/// Scales three raw shares to whole percentages summing to 100. Negative takes
/// the remainder; neutral is capped so rounding never pushes it below zero.
fn renormalize(positive: f64, neutral: f64, negative: f64) -> (u32, u32, u32) {
    let sum = positive + neutral + negative;
    if sum <= 0.0 {
        return (0, 0, 0);
    }
    let positive = (positive * 100.0 / sum).round() as u32;
    let neutral = ((neutral * 100.0 / sum).round() as u32).min(100 - positive);
    (positive, neutral, 100 - positive - neutral)
}

/// Spreads the sentiment mix of `related` reviews over the fixed aspects.
///
/// Each share is jittered by a factor in [0.8, 1.2) and the three shares are
/// renormalized so every aspect sums to 100. With no related reviews all
/// aspects are zero.
pub fn aspect_breakdown<R: Rng + ?Sized>(related: &[Review], rng: &mut R) -> Vec<AspectScore> {
    let total = related.len() as f64;
    let share = |sentiment: Sentiment| {
        related.iter().filter(|r| r.sentiment == sentiment).count() as f64 / total
    };

    ASPECTS
        .iter()
        .map(|name| {
            if related.is_empty() {
                return AspectScore {
                    name: name.to_string(),
                    positive: 0,
                    neutral: 0,
                    negative: 0,
                };
            }

            let mut jitter = |fraction: f64| (fraction * 100.0 * rng.gen_range(0.8..1.2)).round();
            let positive = jitter(share(Sentiment::Positive));
            let neutral = jitter(share(Sentiment::Neutral));
            let negative = jitter(share(Sentiment::Negative));

            let (positive, neutral, negative) = renormalize(positive, neutral, negative);

            AspectScore {
                name: name.to_string(),
                positive,
                neutral,
                negative,
            }
        })
        .collect()
}
