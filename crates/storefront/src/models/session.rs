//! Session state types.

use serde::{Deserialize, Serialize};

use orchard_core::{Email, Role, UserId};

use crate::models::user::User;

/// Session keys used for storing data in the session.
pub mod session_keys {
    /// Key for the logged-in user.
    pub const CURRENT_USER: &str = "current_user";
    /// Key for the anonymous (not-logged-in) cart.
    pub const ANONYMOUS_CART: &str = "cart";
}

/// The logged-in user, as stored in the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: Role,
}

impl CurrentUser {
    /// Whether this session belongs to an admin account.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}
