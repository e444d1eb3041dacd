//! Admin catalog route handlers.
//!
//! Gated by [`RequireAdmin`]; only the admin account can create or delete
//! products. Creation mirrors the product to the payment provider so
//! checkout can reference it by price.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Path, Query, State},
    response::{IntoResponse, Redirect},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use orchard_core::{ProductId, to_minor_units};

use crate::db::RepositoryError;
use crate::db::products::ProductRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::auth::RequireAdmin;
use crate::models::product::NewProduct;
use crate::routes::Nav;
use crate::services::uploads;
use crate::state::AppState;

/// New product form template.
#[derive(Template, WebTemplate)]
#[template(path = "products/new.html")]
pub struct NewProductTemplate {
    pub nav: Nav,
    pub error: Option<String>,
}

/// Query parameters for the new product form.
#[derive(Debug, Deserialize)]
pub struct NewProductQuery {
    pub error: Option<String>,
}

/// Parsed multipart fields for product creation.
#[derive(Default)]
struct ProductForm {
    name: Option<String>,
    category: Option<String>,
    description: Option<String>,
    price: Option<String>,
    image: Option<(String, Vec<u8>)>,
}

/// Display the new product form.
#[instrument(skip_all)]
pub async fn new_product(
    RequireAdmin(user): RequireAdmin,
    Query(query): Query<NewProductQuery>,
) -> impl IntoResponse {
    NewProductTemplate {
        nav: Nav::for_user(Some(&user)),
        error: query.error,
    }
}

/// Create a product from the multipart form and mirror it to Stripe.
///
/// The database row is written first; the provider mirror follows. If the
/// mirror fails the error surfaces to the admin, who re-runs creation
/// after deleting the half-created product.
#[instrument(skip_all)]
pub async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let form = read_product_form(multipart).await?;

    let name = match validate_form(&form) {
        Ok(name) => name.to_owned(),
        Err(message) => return Ok(redirect_with_error(&message)),
    };
    // Checked in validate_form
    let Ok(price) = form.price.as_deref().unwrap_or_default().parse::<Decimal>() else {
        return Ok(redirect_with_error("price must be a number"));
    };
    let Ok(category) = form.category.as_deref().unwrap_or_default().parse::<i32>() else {
        return Ok(redirect_with_error("category must be a number"));
    };
    let Some((filename, bytes)) = form.image else {
        return Ok(redirect_with_error("an image is required"));
    };
    let Some(unit_amount) = to_minor_units(price) else {
        return Ok(redirect_with_error("price must not be negative"));
    };

    let image = match uploads::store_image(&state.config().upload_dir, &filename, &bytes).await {
        Ok(path) => path,
        Err(uploads::UploadError::Io(e)) => return Err(uploads::UploadError::Io(e).into()),
        Err(e) => return Ok(redirect_with_error(&e.to_string())),
    };

    let new = NewProduct {
        name: name.to_owned(),
        image,
        category,
        description: form.description.unwrap_or_default(),
        price,
        owner_id: user.id,
    };

    let product = match ProductRepository::new(state.pool()).create(&new).await {
        Ok(product) => product,
        Err(RepositoryError::Conflict(_)) => {
            return Ok(redirect_with_error("a product with this name already exists"));
        }
        Err(e) => return Err(e.into()),
    };

    // Mirror to the payment provider under the same id
    let mirror = state.stripe().create_product(product.id, &product.name).await?;
    let mirror_price = state.stripe().create_price(product.id, unit_amount).await?;

    tracing::info!(
        product_id = %product.id,
        name = %product.name,
        stripe_product = %mirror.id,
        stripe_price = %mirror_price.id,
        "product created"
    );

    Ok(Redirect::to("/"))
}

/// Delete a product everywhere it exists.
///
/// The provider mirror is deactivated first; the local row (and any cart
/// rows referencing it, via FK cascade) goes second. A provider failure
/// leaves the local row in place.
#[instrument(skip(state, _user))]
pub async fn delete_product(
    State(state): State<AppState>,
    RequireAdmin(_user): RequireAdmin,
    Path(product_id): Path<i32>,
) -> Result<impl IntoResponse> {
    let products = ProductRepository::new(state.pool());
    let id = ProductId::new(product_id);

    let product = products
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;

    let mirror = state.stripe().deactivate_product(id).await?;
    products.delete(id).await?;

    tracing::info!(
        product_id = %id,
        name = %product.name,
        mirror_active = mirror.active,
        "product deleted"
    );

    Ok(Redirect::to("/"))
}

/// Collect the multipart fields into a [`ProductForm`].
async fn read_product_form(mut multipart: Multipart) -> Result<ProductForm> {
    let mut form = ProductForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        let Some(name) = field.name().map(ToOwned::to_owned) else {
            continue;
        };

        match name.as_str() {
            "image" => {
                let filename = field
                    .file_name()
                    .map(ToOwned::to_owned)
                    .ok_or_else(|| AppError::BadRequest("image has no filename".to_owned()))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("failed to read image: {e}")))?;
                form.image = Some((filename, bytes.to_vec()));
            }
            other => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("failed to read field: {e}")))?;
                match other {
                    "name" => form.name = Some(value),
                    "category" => form.category = Some(value),
                    "description" => form.description = Some(value),
                    "price" => form.price = Some(value),
                    _ => {}
                }
            }
        }
    }

    Ok(form)
}

/// First-pass validation; returns the trimmed name.
fn validate_form(form: &ProductForm) -> std::result::Result<&str, String> {
    let name = form.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err("a product name is required".to_owned());
    }
    if form.price.as_deref().unwrap_or_default().trim().is_empty() {
        return Err("a price is required".to_owned());
    }
    if form.category.as_deref().unwrap_or_default().trim().is_empty() {
        return Err("a category is required".to_owned());
    }
    Ok(name)
}

fn redirect_with_error(message: &str) -> Redirect {
    let encoded = urlencoding::encode(message);
    Redirect::to(&format!("/admin/products/new?error={encoded}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_form_requires_name() {
        let form = ProductForm {
            price: Some("10.00".to_owned()),
            category: Some("1".to_owned()),
            ..ProductForm::default()
        };
        assert!(validate_form(&form).is_err());
    }

    #[test]
    fn test_validate_form_trims_name() {
        let form = ProductForm {
            name: Some("  Apple Tree  ".to_owned()),
            price: Some("10.00".to_owned()),
            category: Some("1".to_owned()),
            ..ProductForm::default()
        };
        assert_eq!(validate_form(&form), Ok("Apple Tree"));
    }

    #[test]
    fn test_validate_form_requires_price_and_category() {
        let form = ProductForm {
            name: Some("Apple Tree".to_owned()),
            ..ProductForm::default()
        };
        assert!(validate_form(&form).is_err());
    }
}
