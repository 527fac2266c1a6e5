use serde::{Deserialize, Serialize};
use serde_json::Value;
use storefront_sanitize::{clamp_rating, sanitize_value, DESCRIPTION_MAX, LABEL_MAX};

/// Reviewer name used when none is given.
const ANONYMOUS: &str = "Anonymous";

/// A product review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Star rating, 1 to 5
    pub rating: u8,
    pub text: String,
    pub reviewer_name: String,
    /// ISO-8601 date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// "api" or "user"
    #[serde(default)]
    pub source: String,
}

impl Review {
    /// Sanitize an untyped review record. API reviews put the body under
    /// `comment`, locally written ones under `text`.
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let obj = raw.as_object()?;

        let text = sanitize_value(obj.get("text").or_else(|| obj.get("comment")), Some(DESCRIPTION_MAX));
        let reviewer_name = match sanitize_value(obj.get("reviewerName"), Some(LABEL_MAX)) {
            name if name.is_empty() => ANONYMOUS.to_string(),
            name => name,
        };
        let source = match obj.get("source").and_then(Value::as_str) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => "api".to_string(),
        };

        Some(Self {
            rating: clamp_rating(obj.get("rating")),
            text,
            reviewer_name,
            date: obj.get("date").and_then(Value::as_str).map(str::to_string),
            source,
        })
    }
}

/// Mean rating to one decimal, or `fallback` when there are no reviews.
///
/// A zero fallback counts as "no rating".
pub fn average_rating(reviews: &[Review], fallback: f64) -> Option<f64> {
    if reviews.is_empty() {
        return (fallback > 0.0).then_some(fallback);
    }
    let sum: f64 = reviews.iter().map(|r| f64::from(r.rating)).sum();
    Some((sum / reviews.len() as f64 * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_raw_api_shape() {
        let review = Review::from_raw(&json!({
            "rating": 4,
            "comment": "Works <i>great</i>",
            "date": "2024-05-23T08:56:21.618Z",
            "reviewerName": "John Doe",
            "reviewerEmail": "john@example.com"
        }))
        .unwrap();

        assert_eq!(review.rating, 4);
        assert_eq!(review.text, "Works great");
        assert_eq!(review.reviewer_name, "John Doe");
        assert_eq!(review.source, "api");
    }

    #[test]
    fn test_from_raw_defaults() {
        let review = Review::from_raw(&json!({ "rating": "12", "text": "ok" })).unwrap();
        assert_eq!(review.rating, 5);
        assert_eq!(review.reviewer_name, "Anonymous");
        assert!(Review::from_raw(&json!("nope")).is_none());
    }

    #[test]
    fn test_average_rating() {
        let make = |rating| Review {
            rating,
            text: "x".into(),
            reviewer_name: "A".into(),
            date: None,
            source: "user".into(),
        };
        assert_eq!(average_rating(&[make(5), make(4), make(4)], 0.0), Some(4.3));
        assert_eq!(average_rating(&[], 3.8), Some(3.8));
        assert_eq!(average_rating(&[], 0.0), None);
    }
}
