use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{CreateProductRequest, UpdateProductRequest},
    repo_types::Product,
};
use crate::{
    auth::extractors::AdminUser,
    error::{AppError, StoreError},
    extract::{AppJson, AppPath},
    state::AppState,
};

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[instrument(skip(state))]
pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.products.list().await?))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .products
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;
    Ok(Json(product))
}

#[instrument(skip(state, payload))]
pub async fn create_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppJson(payload): AppJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let product = state.products.create(payload.validate()?).await?;
    info!(product_id = %product.id, admin_id = %admin.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, payload))]
pub async fn update_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateProductRequest>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .products
        .update(id, payload.validate()?)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => AppError::NotFound("Product not found".into()),
            other => other.into(),
        })?;
    info!(product_id = %id, admin_id = %admin.id, "product updated");
    Ok(Json(product))
}

#[instrument(skip(state))]
pub async fn delete_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.products.delete(id).await.map_err(|e| match e {
        StoreError::NotFound => AppError::NotFound("Product not found".into()),
        other => other.into(),
    })?;
    info!(product_id = %id, admin_id = %admin.id, "product deleted");
    Ok(Json(json!({ "message": "Product deleted" })))
}
