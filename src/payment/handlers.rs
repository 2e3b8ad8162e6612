use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use super::{
    dto::{
        to_paise, CreatePaymentOrderRequest, PaymentConfigResponse, VerifyPaymentRequest,
        VerifyPaymentResponse,
    },
    gateway::CreateGatewayOrder,
    signature::verify_signature,
};
use crate::{error::AppError, extract::AppJson, state::AppState};

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payment/config", get(payment_config))
        .route("/payment/verify", post(verify_payment))
        .route("/payment/create-order", post(create_payment_order))
}

pub async fn payment_config(State(state): State<AppState>) -> Json<PaymentConfigResponse> {
    Json(PaymentConfigResponse {
        key_id: state.config.payment.key_id.clone(),
    })
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.trim().is_empty())
}

#[instrument(skip(state, payload))]
pub async fn verify_payment(
    State(state): State<AppState>,
    AppJson(payload): AppJson<VerifyPaymentRequest>,
) -> Result<(StatusCode, Json<VerifyPaymentResponse>), AppError> {
    let (Some(order_id), Some(payment_id), Some(signature)) = (
        required(payload.razorpay_order_id),
        required(payload.razorpay_payment_id),
        required(payload.razorpay_signature),
    ) else {
        return Err(AppError::bad_request("Missing payment fields"));
    };

    let secret = state
        .config
        .payment
        .key_secret
        .as_deref()
        .ok_or_else(|| AppError::Unavailable("Payment gateway is not configured".into()))?;

    if !verify_signature(&order_id, &payment_id, &signature, secret) {
        warn!(%order_id, %payment_id, "payment signature mismatch");
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(VerifyPaymentResponse {
                verified: false,
                error: Some("Invalid signature".into()),
            }),
        ));
    }

    info!(%order_id, %payment_id, "payment verified");
    Ok((
        StatusCode::OK,
        Json(VerifyPaymentResponse {
            verified: true,
            error: None,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn create_payment_order(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreatePaymentOrderRequest>,
) -> Result<Json<Value>, AppError> {
    let gateway = state
        .gateway
        .clone()
        .ok_or_else(|| AppError::Unavailable("Payment gateway is not configured".into()))?;

    let amount = payload
        .amount
        .and_then(to_paise)
        .ok_or_else(|| AppError::bad_request("Valid amount (INR) is required"))?;

    let receipt = format!(
        "rcpt_{}",
        OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
    );
    let order = gateway
        .create_order(CreateGatewayOrder {
            amount,
            currency: "INR".into(),
            receipt,
        })
        .await
        .map_err(|e| {
            error!(error = %e, "gateway create_order failed");
            AppError::BadGateway("Failed to create payment order".into())
        })?;

    Ok(Json(order))
}
