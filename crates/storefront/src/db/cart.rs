//! Cart repository for persisted cart rows.
//!
//! Rows exist only for logged-in users. The anonymous session cart never
//! touches this table.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use orchard_core::{CartRowId, ProductId, UserId};

use super::RepositoryError;
use crate::models::cart::{CartLine, CartRow};
use crate::models::product::Product;

/// Raw `cart_item` row.
#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: i32,
    user_id: i32,
    product_id: i32,
    quantity: i32,
    created_at: DateTime<Utc>,
}

impl From<CartItemRow> for CartRow {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: CartRowId::new(row.id),
            user_id: UserId::new(row.user_id),
            product_id: ProductId::new(row.product_id),
            quantity: row.quantity,
            created_at: row.created_at,
        }
    }
}

/// `cart_item` joined with `product`, for cart display and checkout.
#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: i32,
    user_id: i32,
    product_id: i32,
    quantity: i32,
    created_at: DateTime<Utc>,
    product_name: String,
    product_image: String,
    product_category: i32,
    product_description: String,
    product_price: Decimal,
    product_owner_id: i32,
    product_created_at: DateTime<Utc>,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            row: CartRow {
                id: CartRowId::new(row.id),
                user_id: UserId::new(row.user_id),
                product_id: ProductId::new(row.product_id),
                quantity: row.quantity,
                created_at: row.created_at,
            },
            product: Product {
                id: ProductId::new(row.product_id),
                name: row.product_name,
                image: row.product_image,
                category: row.product_category,
                description: row.product_description,
                price: row.product_price,
                owner_id: UserId::new(row.product_owner_id),
                created_at: row.product_created_at,
            },
        }
    }
}

/// Repository for cart row database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All cart rows for a user joined with their products, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines_for_user(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT c.id, c.user_id, c.product_id, c.quantity, c.created_at,
                   p.name AS product_name,
                   p.image AS product_image,
                   p.category AS product_category,
                   p.description AS product_description,
                   p.price AS product_price,
                   p.owner_id AS product_owner_id,
                   p.created_at AS product_created_at
            FROM cart_item c
            JOIN product p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.id
            ",
        )
        .bind(user_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(CartLine::from).collect())
    }

    /// Get a single cart row by its ID.
    ///
    /// The caller is responsible for checking that the row belongs to the
    /// user acting on it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_row(&self, id: CartRowId) -> Result<Option<CartRow>, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT id, user_id, product_id, quantity, created_at
            FROM cart_item
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(CartRow::from))
    }

    /// Append a new cart row.
    ///
    /// Always inserts; adding the same product twice creates two rows.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add_row(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartRow, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            INSERT INTO cart_item (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, product_id, quantity, created_at
            ",
        )
        .bind(user_id.as_i32())
        .bind(product_id.as_i32())
        .bind(quantity)
        .fetch_one(self.pool)
        .await?;

        Ok(CartRow::from(row))
    }

    /// Insert several cart rows in one transaction.
    ///
    /// Used by cart merge at login; either every row lands or none do.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert or the commit fails.
    pub async fn add_rows(
        &self,
        user_id: UserId,
        items: &[(ProductId, i32)],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for (product_id, quantity) in items {
            sqlx::query("INSERT INTO cart_item (user_id, product_id, quantity) VALUES ($1, $2, $3)")
                .bind(user_id.as_i32())
                .bind(product_id.as_i32())
                .bind(quantity)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Overwrite the quantity of a cart row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the row does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_quantity(
        &self,
        id: CartRowId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE cart_item SET quantity = $2 WHERE id = $1")
            .bind(id.as_i32())
            .bind(quantity)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a cart row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the row does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_row(&self, id: CartRowId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_item WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete every cart row for a user in a single statement.
    ///
    /// Called after a completed checkout.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear_for_user(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_item WHERE user_id = $1")
            .bind(user_id.as_i32())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use orchard_core::Email;

    use crate::db::products::ProductRepository;
    use crate::db::users::UserRepository;
    use crate::models::product::NewProduct;

    async fn seed_user_and_product(pool: &PgPool) -> (UserId, ProductId) {
        let user = UserRepository::new(pool)
            .create("Ada", &Email::parse("ada@example.com").unwrap(), "hash")
            .await
            .unwrap();

        let product = ProductRepository::new(pool)
            .create(&NewProduct {
                name: "Apple Tree".to_owned(),
                image: "images/products/apple.jpg".to_owned(),
                category: 1,
                description: String::new(),
                price: dec!(19.99),
                owner_id: user.id,
            })
            .await
            .unwrap();

        (user.id, product.id)
    }

    #[sqlx::test]
    async fn test_add_row_appends_instead_of_merging(pool: PgPool) {
        let (user_id, product_id) = seed_user_and_product(&pool).await;
        let carts = CartRepository::new(&pool);

        let first = carts.add_row(user_id, product_id, 2).await.unwrap();
        let second = carts.add_row(user_id, product_id, 5).await.unwrap();
        assert_ne!(first.id, second.id);

        let lines = carts.lines_for_user(user_id).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].row.quantity, 2);
        assert_eq!(lines[1].row.quantity, 5);

        let total_quantity: i32 = lines.iter().map(|l| l.row.quantity).sum();
        assert_eq!(total_quantity, 7);
    }

    #[sqlx::test]
    async fn test_clear_for_user_deletes_rows_not_products(pool: PgPool) {
        let (user_id, product_id) = seed_user_and_product(&pool).await;
        let carts = CartRepository::new(&pool);

        carts.add_row(user_id, product_id, 2).await.unwrap();
        carts.add_row(user_id, product_id, 5).await.unwrap();

        let cleared = carts.clear_for_user(user_id).await.unwrap();
        assert_eq!(cleared, 2);
        assert!(carts.lines_for_user(user_id).await.unwrap().is_empty());

        // Clearing an already-empty cart deletes nothing
        assert_eq!(carts.clear_for_user(user_id).await.unwrap(), 0);

        // The catalog row outlives its cart rows
        let product = ProductRepository::new(&pool).get(product_id).await.unwrap();
        assert!(product.is_some());
    }
}
