//! Cart models.
//!
//! Carts exist in two modes. Logged-out visitors get an [`AnonymousCart`]
//! held entirely in the session. Logged-in users get persisted `cart_item`
//! rows keyed by their account. Cart URLs carry a subject id (`0` for the
//! anonymous cart, the account id otherwise) and every cart operation first
//! resolves that subject against the session via [`resolve_cart_identity`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orchard_core::{CartRowId, ProductId, UserId};

use crate::models::product::Product;
use crate::models::session::CurrentUser;

/// Subject id used in cart URLs for the anonymous cart.
pub const ANONYMOUS_SUBJECT: i32 = 0;

/// A persisted cart row for a logged-in user.
///
/// Rows are append-only on add: two adds of the same product create two
/// rows. Each row is addressed by its own id, never by product id.
#[derive(Debug, Clone)]
pub struct CartRow {
    pub id: CartRowId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// A cart row joined with its product, for display and checkout.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub row: CartRow,
    pub product: Product,
}

impl CartLine {
    /// Line subtotal (unit price times quantity).
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.product.price * Decimal::from(self.row.quantity)
    }
}

/// One entry in the anonymous session cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousCartEntry {
    /// Product id in string form, exactly as it appeared in the request.
    pub product_id: String,
    pub quantity: u32,
}

/// The session-held cart for logged-out visitors.
///
/// Entries are keyed by product-id string and keep insertion order.
/// Unlike persisted rows, setting a product that is already present
/// overwrites its quantity in place rather than appending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnonymousCart {
    entries: Vec<AnonymousCartEntry>,
}

impl AnonymousCart {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[AnonymousCartEntry] {
        &self.entries
    }

    /// Add a product or overwrite its quantity if already present.
    ///
    /// An existing entry keeps its position in the cart.
    pub fn set(&mut self, product_id: &str, quantity: u32) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.product_id == product_id) {
            entry.quantity = quantity;
        } else {
            self.entries.push(AnonymousCartEntry {
                product_id: product_id.to_owned(),
                quantity,
            });
        }
    }

    /// Overwrite the quantity of an existing entry.
    ///
    /// Returns `false` (and changes nothing) if the product is not in the cart.
    pub fn update(&mut self, product_id: &str, quantity: u32) -> bool {
        match self.entries.iter_mut().find(|e| e.product_id == product_id) {
            Some(entry) => {
                entry.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Remove an entry. Removing an absent product is a no-op.
    pub fn remove(&mut self, product_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.product_id != product_id);
        self.entries.len() != before
    }
}

/// The resolved owner of a cart request.
#[derive(Debug, Clone)]
pub enum CartIdentity {
    /// Logged-out visitor operating on the session cart.
    Anonymous,
    /// Logged-in user operating on their own persisted rows.
    Authenticated(CurrentUser),
}

/// Rejection from [`resolve_cart_identity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartAccessDenied;

/// Resolve the subject id from a cart URL against the session.
///
/// The only two accepted combinations are a logged-in user addressing
/// their own id, and a logged-out visitor addressing subject `0`. Every
/// other combination is rejected, including a logged-in user addressing
/// the anonymous subject or another user's id.
///
/// # Errors
///
/// Returns [`CartAccessDenied`] for any subject/session mismatch.
pub fn resolve_cart_identity(
    current_user: Option<&CurrentUser>,
    subject_id: i32,
) -> Result<CartIdentity, CartAccessDenied> {
    match current_user {
        Some(user) if subject_id == user.id.as_i32() => {
            Ok(CartIdentity::Authenticated(user.clone()))
        }
        None if subject_id == ANONYMOUS_SUBJECT => Ok(CartIdentity::Anonymous),
        _ => Err(CartAccessDenied),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use orchard_core::{Email, Role};

    fn current_user(id: i32) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            name: "Ada".to_string(),
            email: Email::parse("ada@example.com").unwrap(),
            role: Role::Customer,
        }
    }

    #[test]
    fn test_resolve_logged_in_own_subject() {
        let user = current_user(7);
        let identity = resolve_cart_identity(Some(&user), 7).unwrap();
        assert!(matches!(identity, CartIdentity::Authenticated(u) if u.id == UserId::new(7)));
    }

    #[test]
    fn test_resolve_logged_out_anonymous_subject() {
        let identity = resolve_cart_identity(None, ANONYMOUS_SUBJECT).unwrap();
        assert!(matches!(identity, CartIdentity::Anonymous));
    }

    #[test]
    fn test_resolve_rejects_mismatches() {
        let user = current_user(7);

        // Logged-in user addressing another user's cart
        assert!(resolve_cart_identity(Some(&user), 8).is_err());
        // Logged-in user addressing the anonymous subject
        assert!(resolve_cart_identity(Some(&user), ANONYMOUS_SUBJECT).is_err());
        // Logged-out visitor addressing a real user's cart
        assert!(resolve_cart_identity(None, 7).is_err());
        // Negative subjects never resolve
        assert!(resolve_cart_identity(None, -1).is_err());
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let user = current_user(3);
        for _ in 0..3 {
            assert!(resolve_cart_identity(Some(&user), 3).is_ok());
            assert!(resolve_cart_identity(Some(&user), 4).is_err());
        }
    }

    #[test]
    fn test_anonymous_cart_set_overwrites_in_place() {
        let mut cart = AnonymousCart::new();
        cart.set("10", 1);
        cart.set("11", 2);
        cart.set("10", 5);

        assert_eq!(cart.len(), 2);
        // "10" kept its original position
        assert_eq!(cart.entries()[0].product_id, "10");
        assert_eq!(cart.entries()[0].quantity, 5);
        assert_eq!(cart.entries()[1].product_id, "11");
    }

    #[test]
    fn test_anonymous_cart_update_requires_presence() {
        let mut cart = AnonymousCart::new();
        cart.set("10", 1);

        assert!(cart.update("10", 4));
        assert_eq!(cart.entries()[0].quantity, 4);

        // Absent key changes nothing
        assert!(!cart.update("99", 4));
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn test_anonymous_cart_remove_absent_is_noop() {
        let mut cart = AnonymousCart::new();
        cart.set("10", 1);

        assert!(!cart.remove("99"));
        assert_eq!(cart.len(), 1);

        assert!(cart.remove("10"));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_anonymous_cart_preserves_insertion_order() {
        let mut cart = AnonymousCart::new();
        for id in ["3", "1", "2"] {
            cart.set(id, 1);
        }
        let order: Vec<&str> = cart
            .entries()
            .iter()
            .map(|e| e.product_id.as_str())
            .collect();
        assert_eq!(order, vec!["3", "1", "2"]);
    }
}
