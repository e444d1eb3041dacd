//! Catalog product model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use orchard_core::{ProductId, UserId};

/// A catalog product.
///
/// The price is a [`Decimal`] in the store currency's standard unit.
/// Conversion to minor units happens only at the payment-provider boundary.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Path to the product image, relative to the static file root.
    pub image: String,
    /// Numeric category the product is listed under.
    pub category: i32,
    pub description: String,
    pub price: Decimal,
    /// The admin account that created the product.
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub image: String,
    pub category: i32,
    pub description: String,
    pub price: Decimal,
    pub owner_id: UserId,
}
