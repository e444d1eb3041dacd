//! Stripe API client.
//!
//! Every catalog product is mirrored to Stripe under the same id, with a
//! price attached. Checkout builds a hosted payment session from the
//! mirrored prices; the storefront never handles card data itself.
//!
//! The API is form-encoded throughout. Nested parameters use bracket
//! syntax (`shipping_options[0][shipping_rate_data][type]`).

pub mod types;

use std::time::Duration;

use moka::future::Cache;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use thiserror::Error;

use orchard_core::ProductId;

use crate::config::StripeConfig;
use types::{
    ApiErrorResponse, CheckoutLineItem, CheckoutSession, PriceSearchResponse, StripePrice,
    StripeProduct,
};

const API_BASE: &str = "https://api.stripe.com/v1";

/// Request timeout for all API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a resolved price id stays cached.
const PRICE_CACHE_TTL: Duration = Duration::from_secs(600);

/// Maximum number of cached price ids.
const PRICE_CACHE_CAPACITY: u64 = 1_000;

/// Countries checkout will collect a shipping address for.
const SHIPPING_COUNTRIES: &[&str] = &["US", "CA"];

/// Flat shipping rate in minor units.
const SHIPPING_RATE_MINOR_UNITS: i64 = 499;

/// Shipping option label shown on the hosted payment page.
const SHIPPING_DISPLAY_NAME: &str = "Standard Shipping";

/// Delivery estimate shown on the hosted payment page, in business days.
const DELIVERY_ESTIMATE_DAYS: (u32, u32) = (5, 7);

/// Errors returned by Stripe API operations.
#[derive(Debug, Error)]
pub enum StripeError {
    /// Client construction failed (bad secret key format).
    #[error("stripe client configuration error: {0}")]
    Configuration(String),

    /// The HTTP request itself failed (network, timeout, decode).
    #[error("stripe request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned a non-success status.
    #[error("stripe api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// No price is registered for a product.
    #[error("no price registered for product {0}")]
    MissingPrice(ProductId),
}

/// Stripe API client.
///
/// Cheap to clone; the HTTP connection pool and price cache are shared.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    currency: String,
    /// Caches product id -> price id lookups from price search.
    price_cache: Cache<i32, String>,
}

impl StripeClient {
    /// Create a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Configuration` if the secret key cannot be used
    /// as an HTTP header value, or if the HTTP client cannot be built.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        let mut auth_value = HeaderValue::from_str(&format!(
            "Bearer {}",
            config.secret_key.expose_secret()
        ))
        .map_err(|e| StripeError::Configuration(e.to_string()))?;
        auth_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StripeError::Configuration(e.to_string()))?;

        let price_cache = Cache::builder()
            .max_capacity(PRICE_CACHE_CAPACITY)
            .time_to_live(PRICE_CACHE_TTL)
            .build();

        Ok(Self {
            client,
            currency: config.currency.clone(),
            price_cache,
        })
    }

    /// Mirror a catalog product to Stripe under the same id.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Api` if the API rejects the request (including
    /// an id collision), `StripeError::Http` on transport failure.
    pub async fn create_product(
        &self,
        id: ProductId,
        name: &str,
    ) -> Result<StripeProduct, StripeError> {
        let params = [("id", id.to_string()), ("name", name.to_owned())];

        let response = self
            .client
            .post(format!("{API_BASE}/products"))
            .form(&params)
            .send()
            .await?;

        deserialize_response(response).await
    }

    /// Attach a price (in minor units) to a mirrored product.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Api` or `StripeError::Http` on failure.
    pub async fn create_price(
        &self,
        product: ProductId,
        unit_amount: i64,
    ) -> Result<StripePrice, StripeError> {
        let params = [
            ("product", product.to_string()),
            ("unit_amount", unit_amount.to_string()),
            ("currency", self.currency.clone()),
        ];

        let response = self
            .client
            .post(format!("{API_BASE}/prices"))
            .form(&params)
            .send()
            .await?;

        deserialize_response(response).await
    }

    /// Deactivate a mirrored product so it can no longer be sold.
    ///
    /// Stripe products cannot be deleted once a price references them;
    /// deactivation is the supported retirement path.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Api` or `StripeError::Http` on failure.
    pub async fn deactivate_product(&self, id: ProductId) -> Result<StripeProduct, StripeError> {
        let params = [("active", "false")];

        let response = self
            .client
            .post(format!("{API_BASE}/products/{id}"))
            .form(&params)
            .send()
            .await?;

        self.price_cache.invalidate(&id.as_i32()).await;

        deserialize_response(response).await
    }

    /// Look up the price id for a mirrored product.
    ///
    /// Results are cached; checkout calls this once per cart line.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::MissingPrice` if the product has no price,
    /// `StripeError::Api` or `StripeError::Http` on failure.
    pub async fn find_price(&self, product: ProductId) -> Result<String, StripeError> {
        if let Some(hit) = self.price_cache.get(&product.as_i32()).await {
            return Ok(hit);
        }

        let response = self
            .client
            .get(format!("{API_BASE}/prices/search"))
            .query(&[("query", price_search_query(product))])
            .send()
            .await?;

        let search: PriceSearchResponse = deserialize_response(response).await?;
        let price = search
            .data
            .into_iter()
            .next()
            .ok_or(StripeError::MissingPrice(product))?;

        self.price_cache
            .insert(product.as_i32(), price.id.clone())
            .await;

        Ok(price.id)
    }

    /// Create a hosted checkout session for the given line items.
    ///
    /// The session collects a US/CA shipping address and offers a single
    /// flat-rate shipping option.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Api` or `StripeError::Http` on failure.
    pub async fn create_checkout_session(
        &self,
        line_items: &[CheckoutLineItem],
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let params = checkout_session_form(line_items, success_url, cancel_url, &self.currency);

        let response = self
            .client
            .post(format!("{API_BASE}/checkout/sessions"))
            .form(&params)
            .send()
            .await?;

        deserialize_response(response).await
    }
}

/// Search expression for finding the price attached to a product.
fn price_search_query(product: ProductId) -> String {
    format!("product:'{product}'")
}

/// Build the form body for a checkout session.
///
/// Line item order follows the input slice, so the hosted page shows the
/// cart in the same order the shopper sees it.
fn checkout_session_form(
    line_items: &[CheckoutLineItem],
    success_url: &str,
    cancel_url: &str,
    currency: &str,
) -> Vec<(String, String)> {
    let mut params = vec![
        ("mode".to_owned(), "payment".to_owned()),
        ("success_url".to_owned(), success_url.to_owned()),
        ("cancel_url".to_owned(), cancel_url.to_owned()),
        (
            "payment_method_types[0]".to_owned(),
            "card".to_owned(),
        ),
    ];

    for (i, country) in SHIPPING_COUNTRIES.iter().enumerate() {
        params.push((
            format!("shipping_address_collection[allowed_countries][{i}]"),
            (*country).to_owned(),
        ));
    }

    let rate = "shipping_options[0][shipping_rate_data]";
    params.push((format!("{rate}[type]"), "fixed_amount".to_owned()));
    params.push((
        format!("{rate}[fixed_amount][amount]"),
        SHIPPING_RATE_MINOR_UNITS.to_string(),
    ));
    params.push((format!("{rate}[fixed_amount][currency]"), currency.to_owned()));
    params.push((
        format!("{rate}[display_name]"),
        SHIPPING_DISPLAY_NAME.to_owned(),
    ));
    let (min_days, max_days) = DELIVERY_ESTIMATE_DAYS;
    params.push((
        format!("{rate}[delivery_estimate][minimum][unit]"),
        "business_day".to_owned(),
    ));
    params.push((
        format!("{rate}[delivery_estimate][minimum][value]"),
        min_days.to_string(),
    ));
    params.push((
        format!("{rate}[delivery_estimate][maximum][unit]"),
        "business_day".to_owned(),
    ));
    params.push((
        format!("{rate}[delivery_estimate][maximum][value]"),
        max_days.to_string(),
    ));

    for (i, item) in line_items.iter().enumerate() {
        params.push((format!("line_items[{i}][price]"), item.price.clone()));
        params.push((
            format!("line_items[{i}][quantity]"),
            item.quantity.to_string(),
        ));
    }

    params
}

/// Check the status and deserialize the body, mapping API failures to
/// [`StripeError::Api`] with the provider's message when present.
async fn deserialize_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, StripeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let message = match response.json::<ApiErrorResponse>().await {
        Ok(body) => body
            .error
            .message
            .or(body.error.error_type)
            .unwrap_or_else(|| status_fallback(status)),
        Err(_) => status_fallback(status),
    };

    Err(StripeError::Api {
        status: status.as_u16(),
        message,
    })
}

fn status_fallback(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("unknown error")
        .to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn value_of<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_price_search_query() {
        assert_eq!(price_search_query(ProductId::new(42)), "product:'42'");
    }

    #[test]
    fn test_checkout_session_form_basics() {
        let items = vec![CheckoutLineItem {
            price: "price_123".to_owned(),
            quantity: 2,
        }];
        let params = checkout_session_form(
            &items,
            "https://shop.test/checkout/success/1",
            "https://shop.test/checkout/cancel/1",
            "usd",
        );

        assert_eq!(value_of(&params, "mode"), Some("payment"));
        assert_eq!(
            value_of(&params, "success_url"),
            Some("https://shop.test/checkout/success/1")
        );
        assert_eq!(
            value_of(&params, "cancel_url"),
            Some("https://shop.test/checkout/cancel/1")
        );
        assert_eq!(value_of(&params, "line_items[0][price]"), Some("price_123"));
        assert_eq!(value_of(&params, "line_items[0][quantity]"), Some("2"));
    }

    #[test]
    fn test_checkout_session_form_shipping() {
        let params = checkout_session_form(&[], "https://s", "https://c", "usd");

        assert_eq!(
            value_of(&params, "shipping_address_collection[allowed_countries][0]"),
            Some("US")
        );
        assert_eq!(
            value_of(&params, "shipping_address_collection[allowed_countries][1]"),
            Some("CA")
        );
        assert_eq!(
            value_of(
                &params,
                "shipping_options[0][shipping_rate_data][fixed_amount][amount]"
            ),
            Some("499")
        );
        assert_eq!(
            value_of(
                &params,
                "shipping_options[0][shipping_rate_data][display_name]"
            ),
            Some("Standard Shipping")
        );
        assert_eq!(
            value_of(
                &params,
                "shipping_options[0][shipping_rate_data][delivery_estimate][minimum][value]"
            ),
            Some("5")
        );
        assert_eq!(
            value_of(
                &params,
                "shipping_options[0][shipping_rate_data][delivery_estimate][maximum][value]"
            ),
            Some("7")
        );
    }

    #[test]
    fn test_checkout_session_form_preserves_line_order() {
        let items = vec![
            CheckoutLineItem {
                price: "price_b".to_owned(),
                quantity: 1,
            },
            CheckoutLineItem {
                price: "price_a".to_owned(),
                quantity: 3,
            },
        ];
        let params = checkout_session_form(&items, "https://s", "https://c", "usd");

        assert_eq!(value_of(&params, "line_items[0][price]"), Some("price_b"));
        assert_eq!(value_of(&params, "line_items[1][price]"), Some("price_a"));
        assert_eq!(value_of(&params, "line_items[1][quantity]"), Some("3"));
    }

    #[test]
    fn test_error_display() {
        let err = StripeError::Api {
            status: 402,
            message: "Your card was declined".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "stripe api error (402): Your card was declined"
        );

        let err = StripeError::MissingPrice(ProductId::new(9));
        assert_eq!(err.to_string(), "no price registered for product 9");
    }
}
