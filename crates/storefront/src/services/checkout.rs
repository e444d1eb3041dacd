//! Checkout service.
//!
//! Drives the hosted-payment flow: builds a checkout session from the
//! user's persisted cart rows and clears those rows once the provider
//! redirects back to the success URL.

use sqlx::PgPool;
use thiserror::Error;

use orchard_core::UserId;

use crate::db::RepositoryError;
use crate::db::cart::CartRepository;
use crate::stripe::types::CheckoutLineItem;
use crate::stripe::{StripeClient, StripeError};

/// Errors from checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Checkout was started with no cart rows.
    #[error("cart is empty")]
    EmptyCart,

    /// Payment provider call failed.
    #[error("payment provider error: {0}")]
    Payment(#[from] StripeError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Checkout service.
pub struct CheckoutService<'a> {
    carts: CartRepository<'a>,
    stripe: &'a StripeClient,
    base_url: &'a str,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, stripe: &'a StripeClient, base_url: &'a str) -> Self {
        Self {
            carts: CartRepository::new(pool),
            stripe,
            base_url,
        }
    }

    /// Start a hosted checkout for the user's cart.
    ///
    /// Resolves a provider price reference for every cart line, creates the
    /// session, and returns the hosted payment page URL to redirect to.
    /// The cart itself is left untouched until the success callback.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` if there are no cart rows,
    /// `CheckoutError::Payment` if the provider rejects any call.
    pub async fn begin(&self, user_id: UserId) -> Result<String, CheckoutError> {
        let lines = self.carts.lines_for_user(user_id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let price = self.stripe.find_price(line.product.id).await?;
            items.push(CheckoutLineItem {
                price,
                quantity: i64::from(line.row.quantity),
            });
        }

        let success_url = success_url(self.base_url, user_id);
        let cancel_url = cancel_url(self.base_url, user_id);
        let session = self
            .stripe
            .create_checkout_session(&items, &success_url, &cancel_url)
            .await?;

        tracing::info!(
            user_id = %user_id,
            session_id = %session.id,
            lines = lines.len(),
            "checkout session created"
        );

        Ok(session.url)
    }

    /// Finalize a completed checkout by clearing the user's cart rows.
    ///
    /// Idempotent: a second visit to the success URL clears nothing and
    /// still renders the confirmation page.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if the delete fails.
    pub async fn complete(&self, user_id: UserId) -> Result<(), CheckoutError> {
        let cleared = self.carts.clear_for_user(user_id).await?;
        tracing::info!(user_id = %user_id, cleared, "cart cleared after checkout");
        Ok(())
    }
}

/// Where the provider sends the shopper after payment.
fn success_url(base_url: &str, user_id: UserId) -> String {
    format!(
        "{}/checkout/success/{user_id}",
        base_url.trim_end_matches('/')
    )
}

/// Where the provider sends the shopper if they back out.
fn cancel_url(base_url: &str, user_id: UserId) -> String {
    format!(
        "{}/checkout/cancel/{user_id}",
        base_url.trim_end_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_urls() {
        let user = UserId::new(4);
        assert_eq!(
            success_url("https://shop.test", user),
            "https://shop.test/checkout/success/4"
        );
        assert_eq!(
            cancel_url("https://shop.test/", user),
            "https://shop.test/checkout/cancel/4"
        );
    }
}
