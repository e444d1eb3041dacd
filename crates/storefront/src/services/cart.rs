//! Cart service.
//!
//! Sits between the route handlers and the cart repository. Owns quantity
//! validation, row ownership checks, and the login-time merge of the
//! anonymous session cart into persisted rows.

use sqlx::PgPool;
use thiserror::Error;
use tower_sessions::Session;

use orchard_core::{CartRowId, ProductId, UserId};
use rust_decimal::Decimal;

use crate::db::RepositoryError;
use crate::db::cart::CartRepository;
use crate::db::products::ProductRepository;
use crate::models::cart::{AnonymousCart, CartLine, CartRow};
use crate::models::session_keys;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The addressed product or cart row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The addressed cart row belongs to a different user.
    #[error("cart row belongs to another user")]
    Forbidden,

    /// Client-supplied value failed validation.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Cart merge failure. The whole merge is abandoned; no rows are written.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A session cart entry references a product that no longer exists
    /// (or never did).
    #[error("unknown product in session cart: {0}")]
    UnknownProduct(String),
}

/// Cart service over persisted rows.
pub struct CartService<'a> {
    carts: CartRepository<'a>,
    products: ProductRepository<'a>,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            carts: CartRepository::new(pool),
            products: ProductRepository::new(pool),
        }
    }

    /// All cart lines for a user, oldest row first.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, CartError> {
        Ok(self.carts.lines_for_user(user_id).await?)
    }

    /// Add a product to a user's cart as a fresh row.
    ///
    /// Adding the same product twice intentionally creates two rows; rows
    /// are only ever merged by the shopper editing quantities.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotFound` if the product does not exist.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartRow, CartError> {
        let product = self
            .products
            .get(product_id)
            .await?
            .ok_or_else(|| CartError::NotFound(format!("product {product_id}")))?;

        Ok(self.carts.add_row(user_id, product.id, quantity).await?)
    }

    /// Overwrite the quantity of one of the user's cart rows.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotFound` if the row does not exist and
    /// `CartError::Forbidden` if it belongs to a different user.
    pub async fn update_row(
        &self,
        user_id: UserId,
        row_id: CartRowId,
        quantity: i32,
    ) -> Result<(), CartError> {
        self.owned_row(user_id, row_id).await?;
        Ok(self.carts.update_quantity(row_id, quantity).await?)
    }

    /// Remove one of the user's cart rows.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotFound` if the row does not exist and
    /// `CartError::Forbidden` if it belongs to a different user.
    pub async fn remove_row(&self, user_id: UserId, row_id: CartRowId) -> Result<(), CartError> {
        self.owned_row(user_id, row_id).await?;
        Ok(self.carts.delete_row(row_id).await?)
    }

    /// Merge an anonymous session cart into a user's persisted rows.
    ///
    /// Runs at login and registration, before the session user is set. The
    /// merge is all-or-nothing: if any session entry references a product
    /// that cannot be found, nothing is written and the error is surfaced.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotFound` if a session entry references an
    /// unknown product.
    pub async fn merge_anonymous(
        &self,
        user_id: UserId,
        cart: &AnonymousCart,
    ) -> Result<usize, CartError> {
        if cart.is_empty() {
            return Ok(0);
        }

        let ids: Vec<ProductId> = cart
            .entries()
            .iter()
            .filter_map(|e| e.product_id.parse::<i32>().ok().map(ProductId::new))
            .collect();
        let found = self.products.get_many(&ids).await?;

        let plan = merge_plan(cart, &found)
            .map_err(|MergeError::UnknownProduct(id)| CartError::NotFound(format!("product {id}")))?;

        self.carts.add_rows(user_id, &plan).await?;
        Ok(plan.len())
    }

    /// Fetch a row and verify it belongs to the given user.
    async fn owned_row(&self, user_id: UserId, row_id: CartRowId) -> Result<CartRow, CartError> {
        let row = self
            .carts
            .get_row(row_id)
            .await?
            .ok_or_else(|| CartError::NotFound(format!("cart row {row_id}")))?;

        if row.user_id != user_id {
            return Err(CartError::Forbidden);
        }
        Ok(row)
    }
}

/// Plan the rows a cart merge will write, in session-cart order.
///
/// Fails on the first entry whose product is not among `found`; a failed
/// plan writes nothing.
///
/// # Errors
///
/// Returns [`MergeError::UnknownProduct`] for an unparseable or missing
/// product reference.
pub fn merge_plan(
    cart: &AnonymousCart,
    found: &[crate::models::product::Product],
) -> Result<Vec<(ProductId, i32)>, MergeError> {
    let mut plan = Vec::with_capacity(cart.len());

    for entry in cart.entries() {
        let id = entry
            .product_id
            .parse::<i32>()
            .map_err(|_| MergeError::UnknownProduct(entry.product_id.clone()))?;
        let product_id = ProductId::new(id);

        if !found.iter().any(|p| p.id == product_id) {
            return Err(MergeError::UnknownProduct(entry.product_id.clone()));
        }

        let quantity = i32::try_from(entry.quantity)
            .map_err(|_| MergeError::UnknownProduct(entry.product_id.clone()))?;
        plan.push((product_id, quantity));
    }

    Ok(plan)
}

/// Validate a client-supplied quantity.
///
/// # Errors
///
/// Returns `CartError::Validation` for zero or out-of-range quantities.
pub fn validate_quantity(quantity: u32) -> Result<i32, CartError> {
    if quantity == 0 {
        return Err(CartError::Validation(
            "quantity must be at least 1".to_owned(),
        ));
    }
    i32::try_from(quantity).map_err(|_| CartError::Validation("quantity too large".to_owned()))
}

/// Sum of line subtotals. Display rounding happens at render time only.
#[must_use]
pub fn cart_total(lines: &[CartLine]) -> Decimal {
    lines.iter().map(CartLine::subtotal).sum()
}

// =============================================================================
// Session Slot
// =============================================================================

/// Load the anonymous cart from the session, empty if absent.
pub async fn load_anonymous_cart(session: &Session) -> AnonymousCart {
    session
        .get::<AnonymousCart>(session_keys::ANONYMOUS_CART)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Store the anonymous cart in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn save_anonymous_cart(
    session: &Session,
    cart: &AnonymousCart,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::ANONYMOUS_CART, cart).await
}

/// Drop the anonymous cart from the session.
///
/// Called after a successful merge so the same entries cannot merge twice.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_anonymous_cart(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<AnonymousCart>(session_keys::ANONYMOUS_CART)
        .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use crate::models::product::Product;

    fn product(id: i32, price: Decimal) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            image: "images/products/p.jpg".to_owned(),
            category: 1,
            description: String::new(),
            price,
            owner_id: UserId::new(1),
            created_at: Utc::now(),
        }
    }

    fn line(row_id: i32, quantity: i32, price: Decimal) -> CartLine {
        CartLine {
            row: CartRow {
                id: CartRowId::new(row_id),
                user_id: UserId::new(2),
                product_id: ProductId::new(row_id),
                quantity,
                created_at: Utc::now(),
            },
            product: product(row_id, price),
        }
    }

    #[test]
    fn test_merge_plan_preserves_order_and_quantities() {
        let mut cart = AnonymousCart::new();
        cart.set("30", 2);
        cart.set("10", 1);
        let found = vec![product(10, dec!(5.00)), product(30, dec!(7.50))];

        let plan = merge_plan(&cart, &found).unwrap();
        assert_eq!(plan, vec![(ProductId::new(30), 2), (ProductId::new(10), 1)]);
    }

    #[test]
    fn test_merge_plan_aborts_on_missing_product() {
        let mut cart = AnonymousCart::new();
        cart.set("10", 1);
        cart.set("99", 1);
        let found = vec![product(10, dec!(5.00))];

        let result = merge_plan(&cart, &found);
        assert!(matches!(result, Err(MergeError::UnknownProduct(id)) if id == "99"));
    }

    #[test]
    fn test_merge_plan_aborts_on_unparseable_id() {
        let mut cart = AnonymousCart::new();
        cart.set("not-a-number", 1);

        assert!(merge_plan(&cart, &[]).is_err());
    }

    #[test]
    fn test_merge_plan_empty_cart() {
        assert!(merge_plan(&AnonymousCart::new(), &[]).unwrap().is_empty());
    }

    #[test]
    fn test_validate_quantity() {
        assert_eq!(validate_quantity(1).unwrap(), 1);
        assert_eq!(validate_quantity(40).unwrap(), 40);
        assert!(matches!(
            validate_quantity(0),
            Err(CartError::Validation(_))
        ));
        assert!(matches!(
            validate_quantity(u32::MAX),
            Err(CartError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_quantity_passes_accepted_values_through() {
        // Both cart modes share one validation: the session cart stores the
        // form's u32 as-is, persisted rows the i32. They must agree.
        for quantity in [1_u32, 7, 40, 10_000] {
            assert_eq!(validate_quantity(quantity).unwrap(), i32::try_from(quantity).unwrap());
        }
    }

    #[test]
    fn test_cart_total_sums_line_subtotals() {
        let lines = vec![line(1, 2, dec!(19.99)), line(2, 1, dec!(5.00))];
        assert_eq!(cart_total(&lines), dec!(44.98));
    }

    #[test]
    fn test_cart_total_empty() {
        assert_eq!(cart_total(&[]), Decimal::ZERO);
    }
}
