//! Catalog route handlers: category listing, product detail, add to cart.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use orchard_core::ProductId;
use rust_decimal::Decimal;

use crate::db::products::ProductRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::auth::OptionalAuth;
use crate::models::cart::{CartIdentity, resolve_cart_identity};
use crate::models::product::Product;
use crate::routes::Nav;
use crate::routes::home::CATEGORIES;
use crate::services::cart::{CartService, load_anonymous_cart, save_anonymous_cart, validate_quantity};
use crate::state::AppState;

/// Product display data for templates.
#[derive(Clone)]
pub struct ProductView {
    pub id: i32,
    pub name: String,
    pub image: String,
    pub description: String,
    pub price: Decimal,
    pub category: i32,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.as_i32(),
            name: product.name.clone(),
            image: product.image.clone(),
            description: product.description.clone(),
            price: product.price,
            category: product.category,
        }
    }
}

/// Category listing template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub nav: Nav,
    pub category_name: String,
    pub products: Vec<ProductView>,
}

/// Product detail template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub nav: Nav,
    pub product: ProductView,
}

/// Add-to-cart form body.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    /// Defaults to 1 when the form omits it.
    pub quantity: Option<u32>,
}

fn category_name(category: i32) -> String {
    CATEGORIES
        .iter()
        .find(|&&(id, _)| id == category)
        .map_or_else(|| format!("Category {category}"), |&(_, name)| name.to_owned())
}

/// List products in a category. Unknown categories show an empty list.
#[instrument(skip(state, user))]
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(category_id): Path<i32>,
) -> Result<impl IntoResponse> {
    let products = ProductRepository::new(state.pool())
        .list_by_category(category_id)
        .await?;

    Ok(ProductsIndexTemplate {
        nav: Nav::for_user(user.as_ref()),
        category_name: category_name(category_id),
        products: products.iter().map(ProductView::from).collect(),
    })
}

/// Product detail page.
///
/// The path carries a subject id so the add-to-cart form posts back to the
/// same URL; it is validated on the POST, not here.
#[instrument(skip(state, user))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path((_subject_id, product_id)): Path<(i32, i32)>,
) -> Result<impl IntoResponse> {
    let product = ProductRepository::new(state.pool())
        .get(ProductId::new(product_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;

    Ok(ProductShowTemplate {
        nav: Nav::for_user(user.as_ref()),
        product: ProductView::from(&product),
    })
}

/// Add a product to the cart addressed by the subject id.
///
/// Logged-in users get a fresh persisted row per add; logged-out visitors
/// get a session cart entry, overwritten in place if the product is
/// already there.
#[instrument(skip(state, user, session))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Path((subject_id, product_id)): Path<(i32, i32)>,
    axum::Form(form): axum::Form<AddToCartForm>,
) -> Result<impl IntoResponse> {
    let identity =
        resolve_cart_identity(user.as_ref(), subject_id).map_err(|_| AppError::Forbidden)?;

    let requested = form.quantity.unwrap_or(1);
    let quantity = validate_quantity(requested).map_err(AppError::from)?;
    let product_id = ProductId::new(product_id);

    let product = ProductRepository::new(state.pool())
        .get(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;

    match identity {
        CartIdentity::Authenticated(current) => {
            CartService::new(state.pool())
                .add(current.id, product.id, quantity)
                .await?;
        }
        CartIdentity::Anonymous => {
            let mut cart = load_anonymous_cart(&session).await;
            cart.set(&product.id.to_string(), requested);
            save_anonymous_cart(&session, &cart).await?;
        }
    }

    // Redirect back to the category the product lives in
    Ok(Redirect::to(&format!("/products/{}", product.category)))
}
