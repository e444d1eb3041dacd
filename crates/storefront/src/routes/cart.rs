//! Cart route handlers.
//!
//! Every handler here resolves the subject id in the URL against the
//! session before touching any cart. Logged-in users address persisted
//! rows by row id; logged-out visitors address session entries by
//! product id.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use orchard_core::{CartRowId, ProductId};
use rust_decimal::Decimal;

use crate::db::products::ProductRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::auth::OptionalAuth;
use crate::models::cart::{AnonymousCart, CartIdentity, resolve_cart_identity};
use crate::routes::Nav;
use crate::services::cart::{
    CartService, cart_total, load_anonymous_cart, save_anonymous_cart, validate_quantity,
};
use crate::state::AppState;

/// One cart line as rendered in the template.
///
/// Logged-in carts address lines by `row_id`; anonymous carts by
/// `product_id`. Exactly one of the two is meaningful per mode.
#[derive(Clone)]
pub struct CartLineView {
    pub row_id: Option<i32>,
    pub product_id: String,
    pub name: String,
    pub image: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartTemplate {
    pub nav: Nav,
    pub subject_id: i32,
    pub lines: Vec<CartLineView>,
    pub total: Decimal,
    /// Checkout is only offered to logged-in users.
    pub can_checkout: bool,
}

/// Form body for quantity updates.
#[derive(Debug, Deserialize)]
pub struct UpdateForm {
    /// Persisted row id (logged-in mode).
    pub row_id: Option<i32>,
    /// Session entry key (anonymous mode).
    pub product_id: Option<String>,
    pub quantity: u32,
}

/// Form body for line removal.
#[derive(Debug, Deserialize)]
pub struct RemoveForm {
    pub row_id: Option<i32>,
    pub product_id: Option<String>,
}

/// Display the cart.
#[instrument(skip(state, user, session))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Path(subject_id): Path<i32>,
) -> Result<impl IntoResponse> {
    let identity =
        resolve_cart_identity(user.as_ref(), subject_id).map_err(|_| AppError::Forbidden)?;
    let nav = Nav::for_user(user.as_ref());

    let (lines, total, can_checkout) = match identity {
        CartIdentity::Authenticated(current) => {
            let lines = CartService::new(state.pool()).lines(current.id).await?;
            let total = cart_total(&lines);
            let views = lines
                .iter()
                .map(|line| CartLineView {
                    row_id: Some(line.row.id.as_i32()),
                    product_id: line.product.id.to_string(),
                    name: line.product.name.clone(),
                    image: line.product.image.clone(),
                    quantity: i64::from(line.row.quantity),
                    unit_price: line.product.price,
                    subtotal: line.subtotal(),
                })
                .collect();
            (views, total, true)
        }
        CartIdentity::Anonymous => {
            let cart = load_anonymous_cart(&session).await;
            let (views, total) = anonymous_lines(&state, &cart).await?;
            (views, total, false)
        }
    };

    Ok(CartTemplate {
        nav,
        subject_id,
        lines,
        total,
        can_checkout,
    })
}

/// Overwrite the quantity of one cart line.
#[instrument(skip(state, user, session))]
pub async fn update(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Path(subject_id): Path<i32>,
    axum::Form(form): axum::Form<UpdateForm>,
) -> Result<impl IntoResponse> {
    let identity =
        resolve_cart_identity(user.as_ref(), subject_id).map_err(|_| AppError::Forbidden)?;
    let quantity = validate_quantity(form.quantity).map_err(AppError::from)?;

    match identity {
        CartIdentity::Authenticated(current) => {
            let row_id = form
                .row_id
                .ok_or_else(|| AppError::BadRequest("row_id is required".to_owned()))?;
            CartService::new(state.pool())
                .update_row(current.id, CartRowId::new(row_id), quantity)
                .await?;
        }
        CartIdentity::Anonymous => {
            let product_id = form
                .product_id
                .ok_or_else(|| AppError::BadRequest("product_id is required".to_owned()))?;
            let mut cart = load_anonymous_cart(&session).await;
            // Absent entries are left alone, mirroring removal semantics
            cart.update(&product_id, form.quantity);
            save_anonymous_cart(&session, &cart).await?;
        }
    }

    Ok(Redirect::to(&format!("/cart/{subject_id}")))
}

/// Remove one cart line.
#[instrument(skip(state, user, session))]
pub async fn remove(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Path(subject_id): Path<i32>,
    axum::Form(form): axum::Form<RemoveForm>,
) -> Result<impl IntoResponse> {
    let identity =
        resolve_cart_identity(user.as_ref(), subject_id).map_err(|_| AppError::Forbidden)?;

    match identity {
        CartIdentity::Authenticated(current) => {
            let row_id = form
                .row_id
                .ok_or_else(|| AppError::BadRequest("row_id is required".to_owned()))?;
            CartService::new(state.pool())
                .remove_row(current.id, CartRowId::new(row_id))
                .await?;
        }
        CartIdentity::Anonymous => {
            let product_id = form
                .product_id
                .ok_or_else(|| AppError::BadRequest("product_id is required".to_owned()))?;
            let mut cart = load_anonymous_cart(&session).await;
            // Removing an absent entry is a no-op
            cart.remove(&product_id);
            save_anonymous_cart(&session, &cart).await?;
        }
    }

    Ok(Redirect::to(&format!("/cart/{subject_id}")))
}

/// Resolve anonymous cart entries against the catalog for display.
///
/// Entries whose product has since been deleted are skipped with a
/// warning rather than breaking the page; they will also fail the merge
/// at login, which is where the shopper finds out.
async fn anonymous_lines(
    state: &AppState,
    cart: &AnonymousCart,
) -> Result<(Vec<CartLineView>, Decimal)> {
    let ids: Vec<ProductId> = cart
        .entries()
        .iter()
        .filter_map(|e| e.product_id.parse::<i32>().ok().map(ProductId::new))
        .collect();
    let found = ProductRepository::new(state.pool()).get_many(&ids).await?;

    let mut views = Vec::with_capacity(cart.len());
    let mut total = Decimal::ZERO;

    for entry in cart.entries() {
        let product = entry
            .product_id
            .parse::<i32>()
            .ok()
            .and_then(|id| found.iter().find(|p| p.id == ProductId::new(id)));

        let Some(product) = product else {
            tracing::warn!(product_id = %entry.product_id, "session cart references missing product");
            continue;
        };

        let subtotal = product.price * Decimal::from(entry.quantity);
        total += subtotal;
        views.push(CartLineView {
            row_id: None,
            product_id: entry.product_id.clone(),
            name: product.name.clone(),
            image: product.image.clone(),
            quantity: i64::from(entry.quantity),
            unit_price: product.price,
            subtotal,
        });
    }

    Ok((views, total))
}
