//! Checkout route handlers.
//!
//! All three endpoints require login and reject a subject id that is not
//! the caller's own account, so one user can never start or complete a
//! checkout against another user's cart.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::auth::RequireAuth;
use crate::models::CurrentUser;
use crate::routes::Nav;
use crate::services::checkout::CheckoutService;
use crate::state::AppState;

/// Post-payment confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/success.html")]
pub struct SuccessTemplate {
    pub nav: Nav,
}

/// Abandoned-payment template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/cancel.html")]
pub struct CancelTemplate {
    pub nav: Nav,
}

fn require_own_subject(user: &CurrentUser, subject_id: i32) -> Result<()> {
    if user.id.as_i32() == subject_id {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Start a hosted checkout and redirect the shopper to the payment page.
#[instrument(skip(state, user))]
pub async fn begin(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(subject_id): Path<i32>,
) -> Result<impl IntoResponse> {
    require_own_subject(&user, subject_id)?;

    let url = CheckoutService::new(state.pool(), state.stripe(), &state.config().base_url)
        .begin(user.id)
        .await?;

    Ok(Redirect::to(&url))
}

/// Payment completed: clear the cart and confirm.
///
/// Revisiting this URL is harmless; clearing an already-empty cart is a
/// no-op and the confirmation renders again.
#[instrument(skip(state, user))]
pub async fn success(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(subject_id): Path<i32>,
) -> Result<impl IntoResponse> {
    require_own_subject(&user, subject_id)?;

    CheckoutService::new(state.pool(), state.stripe(), &state.config().base_url)
        .complete(user.id)
        .await?;

    Ok(SuccessTemplate {
        nav: Nav::for_user(Some(&user)),
    })
}

/// Payment abandoned: the cart is left untouched.
#[instrument(skip(user))]
pub async fn cancel(
    RequireAuth(user): RequireAuth,
    Path(subject_id): Path<i32>,
) -> Result<impl IntoResponse> {
    require_own_subject(&user, subject_id)?;

    Ok(CancelTemplate {
        nav: Nav::for_user(Some(&user)),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use orchard_core::{Email, Role, UserId};

    fn user(id: i32) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            name: "Ada".to_string(),
            email: Email::parse("ada@example.com").unwrap(),
            role: Role::Customer,
        }
    }

    #[test]
    fn test_require_own_subject() {
        assert!(require_own_subject(&user(3), 3).is_ok());
        assert!(matches!(
            require_own_subject(&user(3), 4),
            Err(AppError::Forbidden)
        ));
        // The anonymous subject never belongs to a logged-in user
        assert!(matches!(
            require_own_subject(&user(3), 0),
            Err(AppError::Forbidden)
        ));
    }
}
