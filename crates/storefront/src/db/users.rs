//! User repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use orchard_core::{Email, Role, UserId};

use super::{RepositoryError, map_unique_violation};
use crate::models::user::User;

/// Raw `store_user` row. Email and role are validated in [`User::try_from`].
#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let role = Role::parse(&row.role).ok_or_else(|| {
            RepositoryError::DataCorruption(format!("unknown role in database: {}", row.role))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            name: row.name,
            email,
            role,
            created_at: row.created_at,
        })
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a new account.
    ///
    /// The very first account in the table gets the admin role; every later
    /// account is a customer. The role is decided inside the insert statement
    /// so concurrent registrations cannot both become admin.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO store_user (name, email, password_hash, role)
            VALUES (
                $1, $2, $3,
                CASE WHEN EXISTS (SELECT 1 FROM store_user) THEN 'customer' ELSE 'admin' END
            )
            RETURNING id, name, email, role, created_at
            ",
        )
        .bind(name)
        .bind(email.as_str())
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "email already exists"))?;

        User::try_from(row)
    }

    /// Get a user and their password hash by email, for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored value is invalid.
    pub async fn get_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct UserWithHashRow {
            id: i32,
            name: String,
            email: String,
            role: String,
            created_at: DateTime<Utc>,
            password_hash: String,
        }

        let row = sqlx::query_as::<_, UserWithHashRow>(
            r"
            SELECT id, name, email, role, created_at, password_hash
            FROM store_user
            WHERE email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(r) => {
                let password_hash = r.password_hash;
                let user = User::try_from(UserRow {
                    id: r.id,
                    name: r.name,
                    email: r.email,
                    role: r.role,
                    created_at: r.created_at,
                })?;
                Ok(Some((user, password_hash)))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(email: &str, role: &str) -> UserRow {
        UserRow {
            id: 1,
            name: "Ada".to_string(),
            email: email.to_string(),
            role: role.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_conversion_valid() {
        let user = User::try_from(row("ada@example.com", "admin")).unwrap();
        assert_eq!(user.id, UserId::new(1));
        assert!(user.is_admin());
    }

    #[test]
    fn test_row_conversion_rejects_bad_email() {
        let result = User::try_from(row("not-an-email", "customer"));
        assert!(matches!(result, Err(RepositoryError::DataCorruption(_))));
    }

    #[test]
    fn test_row_conversion_rejects_unknown_role() {
        let result = User::try_from(row("ada@example.com", "superuser"));
        assert!(matches!(result, Err(RepositoryError::DataCorruption(_))));
    }
}
