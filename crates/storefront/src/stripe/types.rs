//! Stripe API response types.
//!
//! Only the fields the storefront reads are modeled; everything else in
//! the provider's responses is ignored on deserialization.

use serde::Deserialize;

/// A product object, as returned by `POST /v1/products`.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeProduct {
    pub id: String,
    pub active: bool,
}

/// A price object, as returned by `POST /v1/prices` and price search.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,
}

/// Response envelope for `GET /v1/prices/search`.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceSearchResponse {
    pub data: Vec<StripePrice>,
}

/// A hosted checkout session, as returned by `POST /v1/checkout/sessions`.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted payment page URL the shopper is redirected to.
    pub url: String,
}

/// Error envelope returned by the API on failure.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
}

/// One line of a checkout session, referencing a price by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLineItem {
    pub price: String,
    pub quantity: i64,
}
