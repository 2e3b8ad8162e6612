use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{CreateOrderRequest, UpdateStatusRequest},
    repo_types::{Order, Placed},
    services::{place_order, validate_idempotency_key},
    status::OrderStatus,
};
use crate::{
    auth::extractors::{AdminUser, AuthUser},
    error::{AppError, StoreError},
    extract::{AppJson, AppPath},
    state::AppState,
};

pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route(
            "/orders/:id",
            get(get_order).put(update_order_status).delete(delete_order),
        )
}

fn order_not_found(e: StoreError) -> AppError {
    match e {
        StoreError::NotFound => AppError::NotFound("Order not found".into()),
        other => other.into(),
    }
}

#[instrument(skip(state, headers, payload))]
pub async fn create_order(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    AppJson(payload): AppJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let key = headers
        .get(IDEMPOTENCY_HEADER)
        .map(|v| {
            v.to_str()
                .map_err(|_| AppError::bad_request("Idempotency-Key must be ASCII"))
        })
        .transpose()?;
    let key = validate_idempotency_key(key)?;

    match place_order(&state, auth.id, payload, key).await? {
        Placed::Created(order) => {
            info!(
                order_id = %order.id,
                user_id = %auth.id,
                total = order.total,
                status = %order.status,
                "order created"
            );
            Ok((StatusCode::CREATED, Json(order)))
        }
        Placed::Existing(order) => {
            info!(order_id = %order.id, user_id = %auth.id, "order replayed by idempotency key");
            Ok((StatusCode::OK, Json(order)))
        }
    }
}

#[instrument(skip(state))]
pub async fn list_orders(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Order>>, AppError> {
    let scope = if auth.is_admin() { None } else { Some(auth.id) };
    Ok(Json(state.orders.list(scope).await?))
}

#[instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    if !auth.is_admin() && order.user_id != auth.id {
        return Err(AppError::Forbidden("Forbidden".into()));
    }
    Ok(Json(order))
}

#[instrument(skip(state, payload))]
pub async fn update_order_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let raw = payload
        .status
        .ok_or_else(|| AppError::bad_request("Status is required"))?;
    let to: OrderStatus = raw
        .parse()
        .map_err(|_| AppError::bad_request(format!("Unknown order status: {raw}")))?;

    let order = state
        .orders
        .transition(id, to)
        .await
        .map_err(order_not_found)?;
    info!(order_id = %id, admin_id = %admin.id, status = %order.status, "order status changed");
    Ok(Json(order))
}

#[instrument(skip(state))]
pub async fn delete_order(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.orders.delete(id).await.map_err(order_not_found)?;
    info!(order_id = %id, admin_id = %admin.id, "order deleted");
    Ok(Json(json!({ "message": "Order deleted" })))
}
