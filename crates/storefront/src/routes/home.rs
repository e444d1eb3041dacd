//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::response::IntoResponse;
use tracing::instrument;

use crate::filters;
use crate::middleware::auth::OptionalAuth;
use crate::routes::Nav;

/// A category link on the home page.
#[derive(Clone)]
pub struct CategoryView {
    pub id: i32,
    pub name: &'static str,
}

/// Storefront categories. Products reference these by numeric id.
pub const CATEGORIES: &[(i32, &str)] = &[
    (1, "Fruit Trees"),
    (2, "Fresh Produce"),
    (3, "Preserves & Pantry"),
];

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub nav: Nav,
    pub categories: Vec<CategoryView>,
}

/// Display the home page.
#[instrument(skip_all)]
pub async fn home(OptionalAuth(user): OptionalAuth) -> impl IntoResponse {
    HomeTemplate {
        nav: Nav::for_user(user.as_ref()),
        categories: CATEGORIES
            .iter()
            .map(|&(id, name)| CategoryView { id, name })
            .collect(),
    }
}
