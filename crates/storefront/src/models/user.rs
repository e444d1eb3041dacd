//! User account model.

use chrono::{DateTime, Utc};

use orchard_core::{Email, Role, UserId};

/// A registered account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    /// Display name shown in the header after login.
    pub name: String,
    pub email: Email,
    /// Assigned at registration; the first account becomes admin.
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether this account may manage the catalog.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
