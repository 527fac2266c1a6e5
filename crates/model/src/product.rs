use serde::{Deserialize, Serialize};
use serde_json::Value;
use storefront_sanitize::{sanitize_string, sanitize_value, slugify, DESCRIPTION_MAX, LABEL_MAX, TITLE_MAX};

use crate::{coerce_number, effective_price, ProductId, Review};

/// Display label for products without a category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// A normalized catalog product.
///
/// Only built through [`Product::from_raw`] (or deserialized from a value it
/// produced), so every text field is sanitized and `category_id` is always
/// the slug of `category`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Remote record id
    pub id: ProductId,

    /// Sanitized title (200 chars max)
    pub title: String,

    /// Sanitized description (1000 chars max)
    pub description: String,

    /// Sanitized brand (120 chars max)
    pub brand: String,

    /// Category display label
    pub category: String,

    /// Slug of `category`, never empty
    pub category_id: String,

    /// List price, never negative
    pub price: f64,

    /// Discount in percent
    #[serde(default)]
    pub discount_percentage: f64,

    #[serde(default)]
    pub rating: f64,

    #[serde(default)]
    pub stock: i64,

    /// Thumbnail URL
    #[serde(default)]
    pub thumbnail: String,

    /// Image URLs
    #[serde(default)]
    pub images: Vec<String>,

    /// Reviews shipped with the remote record
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reviews: Vec<Review>,
}

impl Product {
    /// Normalize an untyped catalog record.
    ///
    /// Never fails: a non-object input yields a placeholder product with a
    /// timestamp-derived id. Feeding the serialized form of a normalized
    /// product back in yields an equal product.
    pub fn from_raw(raw: &Value) -> Self {
        let Some(obj) = raw.as_object() else {
            return Self::placeholder();
        };

        let id = obj
            .get("id")
            .and_then(ProductId::from_value)
            .unwrap_or_else(ProductId::placeholder);

        let category = non_empty(sanitize_value(obj.get("category"), Some(LABEL_MAX)))
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        let category_id = slugify(&category);

        let thumbnail = obj
            .get("thumbnail")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let images = obj
            .get("images")
            .and_then(Value::as_array)
            .map(|urls| {
                urls.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let reviews = obj
            .get("reviews")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Review::from_raw).collect())
            .unwrap_or_default();

        Self {
            id,
            title: sanitize_value(obj.get("title"), Some(TITLE_MAX)),
            description: sanitize_value(obj.get("description"), Some(DESCRIPTION_MAX)),
            brand: sanitize_value(obj.get("brand"), Some(LABEL_MAX)),
            category,
            category_id,
            price: coerce_number(obj.get("price")).max(0.0),
            discount_percentage: coerce_number(obj.get("discountPercentage")),
            rating: coerce_number(obj.get("rating")),
            stock: coerce_number(obj.get("stock")).floor() as i64,
            thumbnail,
            images,
            reviews,
        }
    }

    /// Re-apply normalization to an owned product.
    pub fn normalize(self) -> Self {
        let category = non_empty(sanitize_string(&self.category, Some(LABEL_MAX)))
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        Self {
            title: sanitize_string(&self.title, Some(TITLE_MAX)),
            description: sanitize_string(&self.description, Some(DESCRIPTION_MAX)),
            brand: sanitize_string(&self.brand, Some(LABEL_MAX)),
            category_id: slugify(&category),
            category,
            price: finite_or_zero(self.price).max(0.0),
            discount_percentage: finite_or_zero(self.discount_percentage),
            rating: finite_or_zero(self.rating),
            ..self
        }
    }

    fn placeholder() -> Self {
        Self {
            id: ProductId::placeholder(),
            title: String::new(),
            description: String::new(),
            brand: String::new(),
            category: UNCATEGORIZED.to_string(),
            category_id: slugify(UNCATEGORIZED),
            price: 0.0,
            discount_percentage: 0.0,
            rating: 0.0,
            stock: 0,
            thumbnail: String::new(),
            images: Vec::new(),
            reviews: Vec::new(),
        }
    }

    /// Price after discount, rounded to cents.
    pub fn effective_price(&self) -> f64 {
        effective_price(self.price, self.discount_percentage)
    }

    /// Case-insensitive substring match on title, brand or category.
    pub fn matches_search(&self, term: &str) -> bool {
        if term.is_empty() {
            return true;
        }
        let needle = term.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.brand.to_lowercase().contains(&needle)
            || self.category.to_lowercase().contains(&needle)
    }

    /// True for `None`, `""`, `"all"`, or an exact slug match.
    pub fn belongs_to_category(&self, category_id: Option<&str>) -> bool {
        match category_id {
            None | Some("") | Some("all") => true,
            Some(id) => self.category_id == id,
        }
    }
}

/// A catalog category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Slug
    pub id: String,
    /// Display label
    pub label: String,
}

impl Category {
    /// Normalize a remote category, given either as a plain label or as a
    /// `{name, slug}` object.
    pub fn from_raw(raw: &Value) -> Self {
        if let Some(obj) = raw.as_object() {
            let label = non_empty(sanitize_value(obj.get("name"), Some(LABEL_MAX)))
                .or_else(|| non_empty(sanitize_value(obj.get("slug"), Some(LABEL_MAX))))
                .unwrap_or_else(|| UNCATEGORIZED.to_string());
            let id = match obj.get("slug").and_then(Value::as_str) {
                Some(slug) if !slug.is_empty() => slugify(slug),
                _ => slugify(&label),
            };
            return Self { id, label };
        }

        let label = non_empty(sanitize_value(Some(raw), Some(LABEL_MAX)))
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        Self {
            id: slugify(&label),
            label,
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn finite_or_zero(n: f64) -> f64 {
    if n.is_finite() {
        n
    } else {
        0.0
    }
}
