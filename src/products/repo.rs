use async_trait::async_trait;
use uuid::Uuid;

use super::repo_types::{NewProduct, Product, ProductPatch};
use crate::db::PgStore;
use crate::error::StoreError;

/// Catalog store.
#[async_trait]
pub trait ProductRepo: Send + Sync {
    async fn list(&self) -> Result<Vec<Product>, StoreError>;
    async fn get(&self, id: Uuid) -> Result<Option<Product>, StoreError>;
    async fn create(&self, product: NewProduct) -> Result<Product, StoreError>;
    /// Fails with [`StoreError::NotFound`] for an unknown id.
    async fn update(&self, id: Uuid, patch: ProductPatch) -> Result<Product, StoreError>;
    /// Fails with [`StoreError::NotFound`] for an unknown id. Orders holding
    /// snapshots of the product are left untouched.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
impl ProductRepo for PgStore {
    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, price, image, category, stock, created_at
            FROM products
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, price, image, category, stock, created_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create(&self, product: NewProduct) -> Result<Product, StoreError> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (name, price, image, category, stock)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, price, image, category, stock, created_at
            "#,
        )
        .bind(&product.name)
        .bind(product.price)
        .bind(&product.image)
        .bind(&product.category)
        .bind(product.stock)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update(&self, id: Uuid, patch: ProductPatch) -> Result<Product, StoreError> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
               SET name     = COALESCE($2, name),
                   price    = COALESCE($3, price),
                   image    = CASE WHEN $4 THEN $5 ELSE image END,
                   category = COALESCE($6, category),
                   stock    = COALESCE($7, stock)
             WHERE id = $1
            RETURNING id, name, price, image, category, stock, created_at
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(patch.price)
        .bind(patch.image.is_some())
        .bind(patch.image.flatten())
        .bind(&patch.category)
        .bind(patch.stock)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
