//! Free-text search over stored reviews for the history view.

use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::ApiError;
use crate::models::{non_blank, submitted_text, Review};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Text to look for in the review body
    pub q: Option<String>,
    pub category: Option<String>,
    pub product: Option<String>,
}

/// Case-insensitive substring filter. `q` is required; category and product
/// only apply when non-blank, and a review without that field never matches.
pub fn filter_reviews(reviews: Vec<Review>, query: &SearchQuery) -> Result<Vec<Review>, ApiError> {
    let term = submitted_text(query.q.clone())
        .map(|q| q.to_lowercase())
        .ok_or_else(|| ApiError::Validation("Search term is required".to_string()))?;
    let category = non_blank(query.category.clone()).map(|c| c.to_lowercase());
    let product = non_blank(query.product.clone()).map(|p| p.to_lowercase());

    let contains = |field: Option<&str>, needle: &Option<String>| match needle {
        None => true,
        Some(needle) => field.map_or(false, |f| f.to_lowercase().contains(needle.as_str())),
    };

    Ok(reviews
        .into_iter()
        .filter(|r| r.review.to_lowercase().contains(&term))
        .filter(|r| contains(r.category.as_deref(), &category))
        .filter(|r| contains(r.product_name.as_deref(), &product))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classification, NewReview, Sentiment};
    use chrono::Utc;
    use uuid::Uuid;

    fn review(text: &str, category: Option<&str>, product: Option<&str>) -> Review {
        NewReview {
            category: category.map(String::from),
            product_name: product.map(String::from),
            review: text.to_string(),
            classification: Classification::Genuine,
            sentiment: Sentiment::Neutral,
            reason: None,
            accuracy: 80.0,
        }
        .into_review(Uuid::new_v4(), Utc::now())
    }

    fn query(q: &str, category: Option<&str>, product: Option<&str>) -> SearchQuery {
        SearchQuery {
            q: Some(q.to_string()),
            category: category.map(String::from),
            product: product.map(String::from),
        }
    }

    fn corpus() -> Vec<Review> {
        vec![
            review("Battery life is Great", Some("Electronics"), Some("Phone X")),
            review("Great plot twists", Some("Books"), None),
            review("Battery died quickly", None, Some("Phone Y")),
        ]
    }

    #[test]
    fn test_text_match_is_case_insensitive() {
        let found = filter_reviews(corpus(), &query("great", None, None)).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_category_and_product_substrings() {
        let found = filter_reviews(corpus(), &query("battery", Some("electro"), None)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].product_name.as_deref(), Some("Phone X"));

        let found = filter_reviews(corpus(), &query("battery", None, Some("phone"))).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_missing_field_does_not_match_filter() {
        let found = filter_reviews(corpus(), &query("battery", Some("e"), None)).unwrap();
        assert!(found.iter().all(|r| r.category.is_some()));
    }

    #[test]
    fn test_term_is_not_trimmed() {
        let found = filter_reviews(corpus(), &query("great ", None, None)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].review, "Great plot twists");
    }

    #[test]
    fn test_blank_term_rejected() {
        let err = filter_reviews(corpus(), &query("  ", None, None)).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
