//! Local filtering and ordering of the displayed page.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use storefront_model::Product;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown sort order: {0:?} (expected none, price-asc, price-desc or rating-desc)")]
pub struct ParseSortOrderError(String);

/// How a product list is ordered. Prices compare after discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Keep the catalog order
    #[default]
    None,
    PriceAsc,
    PriceDesc,
    RatingDesc,
}

impl FromStr for SortOrder {
    type Err = ParseSortOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "price-asc" => Ok(Self::PriceAsc),
            "price-desc" => Ok(Self::PriceDesc),
            "rating-desc" => Ok(Self::RatingDesc),
            other => Err(ParseSortOrderError(other.to_string())),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::PriceAsc => "price-asc",
            Self::PriceDesc => "price-desc",
            Self::RatingDesc => "rating-desc",
        })
    }
}

/// Filters and ordering for the product list view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    /// Matched against title, brand and category; empty matches all
    pub search: String,
    /// Category slug; `None` or `"all"` matches all
    pub category: Option<String>,
    /// Inclusive lower bound on the discounted price
    pub min_price: Option<f64>,
    /// Inclusive upper bound on the discounted price
    pub max_price: Option<f64>,
    pub sort: SortOrder,
}

impl ListOptions {
    pub fn matches(&self, product: &Product) -> bool {
        let price = product.effective_price();
        product.matches_search(&self.search)
            && product.belongs_to_category(self.category.as_deref())
            && self.min_price.map_or(true, |min| price >= min)
            && self.max_price.map_or(true, |max| price <= max)
    }
}

/// Filter, then sort. Sorting is stable, so ties keep catalog order.
pub fn apply_list_options(products: &[Product], options: &ListOptions) -> Vec<Product> {
    let mut result: Vec<Product> = products.iter().filter(|p| options.matches(p)).cloned().collect();

    match options.sort {
        SortOrder::None => {}
        SortOrder::PriceAsc => result.sort_by(|a, b| a.effective_price().total_cmp(&b.effective_price())),
        SortOrder::PriceDesc => result.sort_by(|a, b| b.effective_price().total_cmp(&a.effective_price())),
        SortOrder::RatingDesc => result.sort_by(|a, b| b.rating.total_cmp(&a.rating)),
    }

    result
}

/// Discounted products, largest discount first.
pub fn select_deals(products: &[Product]) -> Vec<Product> {
    let mut deals: Vec<Product> = products
        .iter()
        .filter(|p| p.discount_percentage > 0.0)
        .cloned()
        .collect();
    deals.sort_by(|a, b| {
        b.discount_percentage
            .partial_cmp(&a.discount_percentage)
            .unwrap_or(Ordering::Equal)
    });
    deals
}
