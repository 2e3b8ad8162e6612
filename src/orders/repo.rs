use async_trait::async_trait;
use sqlx::types::Json;
use tracing::debug;
use uuid::Uuid;

use super::{
    repo_types::{order_total, NewOrder, Order, OrderItem, OrderRow, Placed},
    status::OrderStatus,
};
use crate::db::PgStore;
use crate::error::StoreError;

const PAYMENT_ID_INDEX: &str = "orders_payment_id_idx";

/// An idempotent resubmit must describe the same order it replays.
pub(crate) fn replay(new: &NewOrder, existing: Order) -> Result<Placed, StoreError> {
    if !new.matches(&existing) {
        return Err(StoreError::IdempotencyMismatch);
    }
    debug!(order_id = %existing.id, "idempotent replay");
    Ok(Placed::Existing(existing))
}

/// Order store. Stock movements happen in the same transaction as the order write.
#[async_trait]
pub trait OrderRepo: Send + Sync {
    /// Reserves stock for every line, snapshots catalog data and inserts the order.
    /// Nothing is written when any line fails.
    async fn place(&self, order: NewOrder) -> Result<Placed, StoreError>;
    /// Newest first; `None` lists every user's orders.
    async fn list(&self, user_id: Option<Uuid>) -> Result<Vec<Order>, StoreError>;
    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError>;
    /// Applies a status change allowed by the transition table. Cancelling restores stock.
    async fn transition(&self, id: Uuid, to: OrderStatus) -> Result<Order, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

impl PgStore {
    async fn find_by_idempotency_key(
        &self,
        user_id: Uuid,
        key: &str,
    ) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, items, total, status, payment_method, payment_id,
                   shipping, idempotency_key, created_at, updated_at
              FROM orders
             WHERE user_id = $1 AND idempotency_key = $2
            "#,
        )
        .bind(user_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Order::from))
    }
}

#[async_trait]
impl OrderRepo for PgStore {
    async fn place(&self, new: NewOrder) -> Result<Placed, StoreError> {
        if let Some(key) = new.idempotency_key.as_deref() {
            if let Some(existing) = self.find_by_idempotency_key(new.user_id, key).await? {
                return replay(&new, existing);
            }
        }

        let mut tx = self.pool.begin().await?;

        let mut items = Vec::with_capacity(new.lines.len());
        for line in &new.lines {
            let reserved = sqlx::query_as::<_, (Uuid, String, f64, Option<String>)>(
                r#"
                UPDATE products
                   SET stock = stock - $2
                 WHERE id = $1 AND stock >= $2
                RETURNING id, name, price, image
                "#,
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .fetch_optional(&mut *tx)
            .await?;

            let Some((product_id, name, price, image)) = reserved else {
                let existing: Option<String> =
                    sqlx::query_scalar("SELECT name FROM products WHERE id = $1")
                        .bind(line.product_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                return Err(match existing {
                    Some(name) => StoreError::InsufficientStock {
                        product_id: line.product_id,
                        name,
                    },
                    None => StoreError::UnknownProduct(line.product_id),
                });
            };

            items.push(OrderItem {
                product_id,
                name,
                price,
                quantity: line.quantity,
                image,
            });
        }

        let total = order_total(&items);
        let inserted = sqlx::query_as::<_, OrderRow>(
            r#"
            INSERT INTO orders (user_id, items, total, status, payment_method, payment_id,
                                shipping, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, items, total, status, payment_method, payment_id,
                      shipping, idempotency_key, created_at, updated_at
            "#,
        )
        .bind(new.user_id)
        .bind(Json(&items))
        .bind(total)
        .bind(new.status)
        .bind(new.payment_method)
        .bind(&new.payment_id)
        .bind(Json(&new.shipping))
        .bind(&new.idempotency_key)
        .fetch_one(&mut *tx)
        .await;

        match inserted {
            Ok(row) => {
                tx.commit().await?;
                Ok(Placed::Created(row.into()))
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                let payment_reused = db.constraint() == Some(PAYMENT_ID_INDEX);
                tx.rollback().await?;
                if payment_reused {
                    return Err(StoreError::PaymentReused(
                        new.payment_id.clone().unwrap_or_default(),
                    ));
                }
                // A concurrent submit with the same key won the race.
                let key = new.idempotency_key.as_deref().unwrap_or_default();
                let existing = self
                    .find_by_idempotency_key(new.user_id, key)
                    .await?
                    .ok_or(StoreError::NotFound)?;
                replay(&new, existing)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, user_id: Option<Uuid>) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, items, total, status, payment_method, payment_id,
                   shipping, idempotency_key, created_at, updated_at
              FROM orders
             WHERE $1::uuid IS NULL OR user_id = $1
             ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, items, total, status, payment_method, payment_id,
                   shipping, idempotency_key, created_at, updated_at
              FROM orders
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Order::from))
    }

    async fn transition(&self, id: Uuid, to: OrderStatus) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, items, total, status, payment_method, payment_id,
                   shipping, idempotency_key, created_at, updated_at
              FROM orders
             WHERE id = $1
               FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound)?;

        if !current.status.can_transition(to, current.payment_method) {
            return Err(StoreError::InvalidTransition {
                from: current.status,
                to,
            });
        }

        if to == OrderStatus::Cancelled {
            // Products deleted since the order was placed are skipped.
            for item in current.items.0.iter() {
                sqlx::query("UPDATE products SET stock = stock + $2 WHERE id = $1")
                    .bind(item.product_id)
                    .bind(item.quantity)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let updated = sqlx::query_as::<_, OrderRow>(
            r#"
            UPDATE orders
               SET status = $2, updated_at = now()
             WHERE id = $1
            RETURNING id, user_id, items, total, status, payment_method, payment_id,
                      shipping, idempotency_key, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(to)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated.into())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
