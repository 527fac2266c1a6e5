use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::collections::HashMap;
use storefront_model::Review;
use storefront_sanitize::{clamp_rating, sanitize_string, DESCRIPTION_MAX, LABEL_MAX};
use storefront_storage::{KeyValueStore, Persistence};

use crate::ReviewError;

/// Unsanitized review form input.
#[derive(Debug, Clone, Default)]
pub struct ReviewDraft {
    /// `None` rates 5
    pub rating: Option<i64>,
    pub text: String,
    pub reviewer_name: String,
}

/// Owner of the reviews written by the local user.
pub struct ReviewStore<S> {
    persistence: Persistence<S>,
    by_product: HashMap<String, Vec<Review>>,
}

impl<S: KeyValueStore> ReviewStore<S> {
    pub fn open(persistence: Persistence<S>) -> Self {
        let by_product = persistence.load_reviews();
        tracing::debug!(products = by_product.len(), "User reviews loaded");
        Self {
            persistence,
            by_product,
        }
    }

    /// Sanitize, store and persist a review.
    pub fn add_review(&mut self, product_id: &str, draft: ReviewDraft) -> Result<Review, ReviewError> {
        let text = sanitize_string(&draft.text, Some(DESCRIPTION_MAX));
        if text.is_empty() {
            return Err(ReviewError::EmptyText);
        }

        let reviewer_name = match sanitize_string(&draft.reviewer_name, Some(LABEL_MAX)) {
            name if name.is_empty() => "Anonymous".to_string(),
            name => name,
        };

        let review = Review {
            rating: clamp_rating(draft.rating.map(Value::from).as_ref()),
            text,
            reviewer_name,
            date: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            source: "user".to_string(),
        };

        self.by_product
            .entry(product_id.to_string())
            .or_default()
            .push(review.clone());
        self.persistence.save_reviews(&self.by_product);
        tracing::info!(product_id, rating = review.rating, "Review added");

        Ok(review)
    }

    pub fn user_reviews(&self, product_id: &str) -> &[Review] {
        self.by_product.get(product_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// API reviews first, then the user's own.
    pub fn reviews_for_product(&self, product_id: &str, api_reviews: &[Review]) -> Vec<Review> {
        api_reviews
            .iter()
            .chain(self.user_reviews(product_id))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use storefront_model::{average_rating, Product};
    use storefront_storage::MemoryStore;

    fn draft(rating: Option<i64>, text: &str, name: &str) -> ReviewDraft {
        ReviewDraft {
            rating,
            text: text.to_string(),
            reviewer_name: name.to_string(),
        }
    }

    #[test]
    fn test_add_review_sanitizes() {
        let mut store = ReviewStore::open(Persistence::new(MemoryStore::new()));

        let review = store
            .add_review("1", draft(Some(9), "  <b>Solid</b> mug ", ""))
            .unwrap();

        assert_eq!(review.rating, 5);
        assert_eq!(review.text, "Solid mug");
        assert_eq!(review.reviewer_name, "Anonymous");
        assert_eq!(review.source, "user");
        assert!(review.date.is_some());
    }

    #[test]
    fn test_rating_defaults_and_floor() {
        let mut store = ReviewStore::open(Persistence::new(MemoryStore::new()));
        assert_eq!(store.add_review("1", draft(None, "ok", "Ana")).unwrap().rating, 5);
        assert_eq!(store.add_review("1", draft(Some(-3), "bad", "Ana")).unwrap().rating, 1);
    }

    #[test]
    fn test_empty_text_is_rejected() {
        let mut store = ReviewStore::open(Persistence::new(MemoryStore::new()));

        let err = store.add_review("1", draft(Some(4), "<script></script>", "Eve")).unwrap_err();

        assert_eq!(err, ReviewError::EmptyText);
        assert!(store.user_reviews("1").is_empty());
    }

    #[test]
    fn test_reviews_survive_reopen() {
        let persistence = Persistence::new(MemoryStore::new());
        let mut store = ReviewStore::open(persistence.clone());
        store.add_review("42", draft(Some(3), "Fine", "Bo")).unwrap();

        let reopened = ReviewStore::open(persistence);

        assert_eq!(reopened.user_reviews("42"), store.user_reviews("42"));
        assert!(reopened.user_reviews("7").is_empty());
    }

    #[test]
    fn test_api_reviews_come_first() {
        let product = Product::from_raw(&serde_json::json!({
            "id": 42,
            "title": "Lamp",
            "rating": 4.1,
            "reviews": [
                { "rating": 5, "comment": "Great", "reviewerName": "A" },
                { "rating": 4, "comment": "Good", "reviewerName": "B" }
            ]
        }));
        let mut store = ReviewStore::open(Persistence::new(MemoryStore::new()));
        store.add_review("42", draft(Some(1), "Broke", "C")).unwrap();

        let reviews = store.reviews_for_product(&product.id.key(), &product.reviews);

        let texts: Vec<&str> = reviews.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Great", "Good", "Broke"]);
        assert_eq!(average_rating(&reviews, product.rating), Some(3.3));
    }
}
