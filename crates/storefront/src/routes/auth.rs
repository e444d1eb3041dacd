//! Authentication route handlers.
//!
//! Login and registration both finish the same way: merge the anonymous
//! session cart into the account's persisted rows, clear the session
//! slot, and only then record the user in the session. A failed merge
//! aborts the login so no cart entries are silently dropped.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::auth::{OptionalAuth, RequireAuth, set_current_user};
use crate::models::CurrentUser;
use crate::models::user::User;
use crate::routes::Nav;
use crate::services::auth::{AuthError, AuthService};
use crate::services::cart::{CartService, clear_anonymous_cart, load_anonymous_cart};
use crate::state::AppState;

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub nav: Nav,
    pub error: Option<String>,
    pub notice: Option<String>,
}

/// Registration page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub nav: Nav,
    pub error: Option<String>,
}

/// Query parameters for the login page.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub error: Option<String>,
    pub notice: Option<String>,
}

/// Query parameters for the registration page.
#[derive(Debug, Deserialize)]
pub struct RegisterQuery {
    pub error: Option<String>,
}

/// Login form body.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form body.
#[derive(Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Display the login page.
#[instrument(skip_all)]
pub async fn login_page(
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<LoginQuery>,
) -> impl IntoResponse {
    LoginTemplate {
        nav: Nav::for_user(user.as_ref()),
        error: query.error,
        notice: query.notice,
    }
}

/// Handle a login attempt.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    axum::Form(form): axum::Form<LoginForm>,
) -> Result<impl IntoResponse> {
    let user = match AuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await
    {
        Ok(user) => user,
        Err(AuthError::InvalidCredentials) => {
            return Ok(Redirect::to("/auth/login?error=Invalid+email+or+password"));
        }
        Err(e) => return Err(e.into()),
    };

    establish_session(&state, &session, &user).await?;
    tracing::info!(user_id = %user.id, "user logged in");

    Ok(Redirect::to("/"))
}

/// Display the registration page.
#[instrument(skip_all)]
pub async fn register_page(
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<RegisterQuery>,
) -> impl IntoResponse {
    RegisterTemplate {
        nav: Nav::for_user(user.as_ref()),
        error: query.error,
    }
}

/// Handle a registration attempt.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    axum::Form(form): axum::Form<RegisterForm>,
) -> Result<impl IntoResponse> {
    let user = match AuthService::new(state.pool())
        .register(&form.name, &form.email, &form.password)
        .await
    {
        Ok(user) => user,
        Err(AuthError::UserAlreadyExists) => {
            // Send existing accounts to login instead of leaking a 409
            return Ok(Redirect::to(
                "/auth/login?notice=Account+already+exists%2C+please+log+in",
            ));
        }
        Err(
            e @ (AuthError::WeakPassword(_)
            | AuthError::InvalidEmail(_)
            | AuthError::InvalidName(_)),
        ) => {
            let msg = urlencoding::encode(&e.to_string()).into_owned();
            return Ok(Redirect::to(&format!("/auth/register?error={msg}")));
        }
        Err(e) => return Err(e.into()),
    };

    establish_session(&state, &session, &user).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "account registered");

    Ok(Redirect::to("/"))
}

/// Log the user out and drop their session state.
///
/// The whole session is flushed, so any leftover anonymous-cart slot goes
/// with it.
#[instrument(skip_all)]
pub async fn logout(RequireAuth(user): RequireAuth, session: Session) -> Result<impl IntoResponse> {
    session.flush().await?;
    clear_sentry_user();
    tracing::info!(user_id = %user.id, "user logged out");

    Ok(Redirect::to("/"))
}

/// Merge the anonymous cart and record the user in the session.
///
/// Order matters: the merge runs before the session user is set, so a
/// merge failure leaves the visitor logged out with their session cart
/// intact. The slot is cleared only after the merge commits.
async fn establish_session(state: &AppState, session: &Session, user: &User) -> Result<()> {
    let anonymous_cart = load_anonymous_cart(session).await;
    if !anonymous_cart.is_empty() {
        let merged = CartService::new(state.pool())
            .merge_anonymous(user.id, &anonymous_cart)
            .await
            .map_err(AppError::from)?;
        clear_anonymous_cart(session).await?;
        tracing::info!(user_id = %user.id, merged, "anonymous cart merged");
    }

    let current = CurrentUser::from(user);
    set_current_user(session, &current).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));

    Ok(())
}
