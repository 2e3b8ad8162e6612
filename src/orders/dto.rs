use serde::Deserialize;
use uuid::Uuid;

use super::repo_types::Shipping;

/// One cart line as sent by the client. Name and price, if present, are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: Uuid,
    #[serde(alias = "qty")]
    pub quantity: Option<i32>,
}

/// Gateway callback fields proving a prepaid order was settled.
#[derive(Debug, Deserialize)]
pub struct PaymentProof {
    #[serde(alias = "razorpay_order_id", alias = "orderId")]
    pub order_id: String,
    #[serde(alias = "razorpay_payment_id", alias = "paymentId")]
    pub payment_id: String,
    #[serde(alias = "razorpay_signature")]
    pub signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub shipping: Shipping,
    pub payment_method: Option<String>,
    pub payment: Option<PaymentProof>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}
