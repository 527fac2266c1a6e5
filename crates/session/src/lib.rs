//! Session state owners for the cart and user reviews.
//!
//! Each store holds the current value in memory and writes it through to
//! [`Persistence`](storefront_storage::Persistence) after every change:
//! - `CartStore`: the shopping cart
//! - `ReviewStore`: reviews written by the local user, keyed by product id

use thiserror::Error;

mod cart;
mod reviews;

pub use cart::CartStore;
pub use reviews::{ReviewDraft, ReviewStore};

/// Errors from review submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("Review text cannot be empty.")]
    EmptyText,
}
