use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use super::status::{OrderStatus, PaymentMethod};

/// Line item as captured from the catalog when the order was placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub price: f64,
    pub quantity: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Shipping {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub locality: String,
    pub landmark: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderItem>,
    pub total: f64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    pub shipping: Shipping,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Json<Vec<OrderItem>>,
    pub total: f64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_id: Option<String>,
    pub shipping: Json<Shipping>,
    pub idempotency_key: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<OrderRow> for Order {
    fn from(r: OrderRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            items: r.items.0,
            total: r.total,
            status: r.status,
            payment_method: r.payment_method,
            payment_id: r.payment_id,
            shipping: r.shipping.0,
            idempotency_key: r.idempotency_key,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Requested quantity of one product; prices and names come from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    /// Sorted by product id with duplicates merged.
    pub lines: Vec<OrderLine>,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_id: Option<String>,
    pub shipping: Shipping,
    pub idempotency_key: Option<String>,
}

impl NewOrder {
    /// True when `order` was placed from the same cart, shipping and payment.
    /// Lines and stored items are both sorted by product id.
    pub fn matches(&self, order: &Order) -> bool {
        self.payment_method == order.payment_method
            && self.payment_id == order.payment_id
            && self.shipping == order.shipping
            && self.lines.len() == order.items.len()
            && self
                .lines
                .iter()
                .zip(&order.items)
                .all(|(l, i)| l.product_id == i.product_id && l.quantity == i.quantity)
    }
}

/// Result of placing an order: freshly created, or an earlier order replayed by idempotency key.
#[derive(Debug, Clone)]
pub enum Placed {
    Created(Order),
    Existing(Order),
}

/// Σ price × quantity, rounded to paise.
pub fn order_total(items: &[OrderItem]) -> f64 {
    let sum: f64 = items
        .iter()
        .map(|i| i.price * f64::from(i.quantity))
        .sum();
    (sum * 100.0).round() / 100.0
}
