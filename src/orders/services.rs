use std::collections::BTreeMap;

use tracing::warn;
use uuid::Uuid;

use super::{
    dto::{CartItem, CreateOrderRequest, PaymentProof},
    repo_types::{NewOrder, OrderLine, Placed, Shipping},
    status::PaymentMethod,
};
use crate::{
    error::{capitalize, AppError},
    payment::signature::verify_signature,
    state::AppState,
};

const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// Merges repeated products and rejects empty carts or non-positive quantities.
/// Lines come back sorted by product id so concurrent orders lock rows in the same order.
pub(crate) fn merge_lines(items: &[CartItem]) -> Result<Vec<OrderLine>, AppError> {
    if items.is_empty() {
        return Err(AppError::bad_request("Order items required"));
    }
    let mut merged: BTreeMap<Uuid, i32> = BTreeMap::new();
    for item in items {
        let qty = item.quantity.unwrap_or(1);
        if qty < 1 {
            return Err(AppError::bad_request("Quantity must be at least 1"));
        }
        let slot = merged.entry(item.product_id).or_insert(0);
        *slot = slot
            .checked_add(qty)
            .ok_or_else(|| AppError::bad_request("Quantity too large"))?;
    }
    Ok(merged
        .into_iter()
        .map(|(product_id, quantity)| OrderLine {
            product_id,
            quantity,
        })
        .collect())
}

pub(crate) fn validate_shipping(shipping: Shipping) -> Result<Shipping, AppError> {
    let s = Shipping {
        name: shipping.name.trim().to_string(),
        phone: shipping.phone.trim().to_string(),
        address: shipping.address.trim().to_string(),
        city: shipping.city.trim().to_string(),
        state: shipping.state.trim().to_string(),
        pincode: shipping.pincode.trim().to_string(),
        locality: shipping.locality.trim().to_string(),
        landmark: shipping.landmark.trim().to_string(),
    };
    let fields = [
        &s.name, &s.phone, &s.address, &s.city, &s.state, &s.pincode, &s.locality, &s.landmark,
    ];
    if fields.iter().any(|f| f.is_empty()) {
        return Err(AppError::bad_request("All shipping fields are required"));
    }
    Ok(s)
}

pub(crate) fn validate_idempotency_key(raw: Option<&str>) -> Result<Option<String>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(k) if k.len() > MAX_IDEMPOTENCY_KEY_LEN => {
            Err(AppError::bad_request("Idempotency-Key is too long"))
        }
        Some(k) => Ok(Some(k.to_string())),
    }
}

/// Prepaid orders must carry a gateway proof that verifies against the configured secret.
fn settle_payment(
    state: &AppState,
    method: PaymentMethod,
    proof: Option<PaymentProof>,
) -> Result<Option<String>, AppError> {
    if !method.is_prepaid() {
        return Ok(None);
    }
    let secret = state
        .config
        .payment
        .key_secret
        .as_deref()
        .ok_or_else(|| AppError::Unavailable("Payment gateway is not configured".into()))?;
    let proof = proof.ok_or_else(|| {
        AppError::bad_request("Payment verification is required for prepaid orders")
    })?;
    if !verify_signature(&proof.order_id, &proof.payment_id, &proof.signature, secret) {
        warn!(gateway_order_id = %proof.order_id, "order rejected: invalid payment signature");
        return Err(AppError::bad_request("Invalid payment signature"));
    }
    Ok(Some(proof.payment_id))
}

pub async fn place_order(
    state: &AppState,
    user_id: Uuid,
    req: CreateOrderRequest,
    idempotency_key: Option<String>,
) -> Result<Placed, AppError> {
    let lines = merge_lines(&req.items)?;
    let shipping = validate_shipping(req.shipping)?;
    let payment_method = match req.payment_method.as_deref() {
        None | Some("") => PaymentMethod::Cod,
        Some(m) => m
            .parse::<PaymentMethod>()
            .map_err(|e| AppError::bad_request(capitalize(&e.to_string())))?,
    };
    let payment_id = settle_payment(state, payment_method, req.payment)?;

    let placed = state
        .orders
        .place(NewOrder {
            user_id,
            lines,
            status: payment_method.initial_status(),
            payment_method,
            payment_id,
            shipping,
            idempotency_key,
        })
        .await?;
    Ok(placed)
}
