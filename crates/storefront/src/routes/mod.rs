//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                                - Home page (category links)
//! GET  /health                          - Health check
//!
//! # Catalog
//! GET  /products/{category_id}          - Products in a category
//! GET  /product/{subject_id}/{id}       - Product detail
//! POST /product/{subject_id}/{id}       - Add to cart
//!
//! # Cart
//! GET  /cart/{subject_id}               - Cart page
//! POST /cart/{subject_id}/update        - Overwrite a line quantity
//! POST /cart/{subject_id}/remove        - Remove a line
//!
//! # Checkout (requires auth)
//! GET  /checkout/{subject_id}           - Redirect to hosted payment page
//! GET  /checkout/success/{subject_id}   - Payment completed; cart cleared
//! GET  /checkout/cancel/{subject_id}    - Payment abandoned; cart kept
//!
//! # Auth
//! GET  /auth/login                      - Login page
//! POST /auth/login                      - Login action (merges session cart)
//! GET  /auth/register                   - Register page
//! POST /auth/register                   - Register action (merges session cart)
//! POST /auth/logout                     - Logout action
//!
//! # Admin (requires admin role)
//! GET  /admin/products/new              - New product form
//! POST /admin/products                  - Create product (multipart)
//! POST /admin/products/{id}/delete      - Delete product
//! ```
//!
//! Cart and checkout URLs carry a subject id: `0` for the anonymous
//! session cart, the account id for a logged-in user. Handlers resolve
//! the subject against the session and reject mismatches.

pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod home;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::models::CurrentUser;
use crate::models::cart::ANONYMOUS_SUBJECT;
use crate::state::AppState;

/// Shared header/navigation context rendered by the base template.
#[derive(Clone)]
pub struct Nav {
    /// Subject id used to build cart links (`0` when logged out).
    pub subject_id: i32,
    pub user_name: Option<String>,
    pub is_admin: bool,
}

impl Nav {
    /// Build the nav context from the session user, if any.
    #[must_use]
    pub fn for_user(user: Option<&CurrentUser>) -> Self {
        match user {
            Some(u) => Self {
                subject_id: u.id.as_i32(),
                user_name: Some(u.name.clone()),
                is_admin: u.is_admin(),
            },
            None => Self {
                subject_id: ANONYMOUS_SUBJECT,
                user_name: None,
                is_admin: false,
            },
        }
    }
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/{subject_id}", get(cart::show))
        .route("/{subject_id}/update", post(cart::update))
        .route("/{subject_id}/remove", post(cart::remove))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/{subject_id}", get(checkout::begin))
        .route("/success/{subject_id}", get(checkout::success))
        .route("/cancel/{subject_id}", get(checkout::cancel))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/products/new", get(admin::new_product))
        .route("/products", post(admin::create_product))
        .route("/products/{id}/delete", post(admin::delete_product))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Home page
        .route("/", get(home::home))
        // Catalog
        .route("/products/{category_id}", get(products::index))
        .route(
            "/product/{subject_id}/{product_id}",
            get(products::show).post(products::add_to_cart),
        )
        // Cart
        .nest("/cart", cart_routes())
        // Checkout
        .nest("/checkout", checkout_routes())
        // Auth
        .nest("/auth", auth_routes())
        // Admin
        .nest("/admin", admin_routes())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use orchard_core::{Email, Role, UserId};

    #[test]
    fn test_nav_for_logged_out_visitor() {
        let nav = Nav::for_user(None);
        assert_eq!(nav.subject_id, ANONYMOUS_SUBJECT);
        assert!(nav.user_name.is_none());
        assert!(!nav.is_admin);
    }

    #[test]
    fn test_nav_for_logged_in_user() {
        let user = CurrentUser {
            id: UserId::new(5),
            name: "Ada".to_string(),
            email: Email::parse("ada@example.com").unwrap(),
            role: Role::Admin,
        };
        let nav = Nav::for_user(Some(&user));
        assert_eq!(nav.subject_id, 5);
        assert_eq!(nav.user_name.as_deref(), Some("Ada"));
        assert!(nav.is_admin);
    }
}
