//! `/products`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use mos_product::{NewProduct, Product, ProductUpdate};

use super::error::ApiError;
use super::extract::Scope;
use super::{default_limit, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route(
            "/{id}",
            get(get_product).patch(update_product).delete(delete_product),
        )
        .route("/{id}/stock", post(adjust_stock))
}

#[derive(Debug, Deserialize)]
struct ProductQuery {
    owner: Option<String>,
    #[serde(default)]
    offset: u64,
    #[serde(default = "default_limit")]
    limit: u64,
}

#[derive(Debug, Deserialize)]
struct StockAdjustment {
    delta: i64,
}

async fn create_product(
    State(state): State<AppState>,
    scope: Scope,
    Json(request): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    scope.require_user()?;
    let Scope(mut ctx) = scope;
    let product = state.products.create_product(&mut ctx, request).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn list_products(
    State(state): State<AppState>,
    Scope(mut ctx): Scope,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state
        .products
        .list_products(&mut ctx, query.owner.as_deref(), query.offset, query.limit)
        .await?;
    Ok(Json(products))
}

async fn get_product(
    State(state): State<AppState>,
    Scope(mut ctx): Scope,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.products.get_product(&mut ctx, &id).await?))
}

async fn update_product(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<String>,
    Json(update): Json<ProductUpdate>,
) -> Result<Json<Product>, ApiError> {
    scope.require_user()?;
    let Scope(mut ctx) = scope;
    Ok(Json(state.products.update_product(&mut ctx, &id, update).await?))
}

async fn adjust_stock(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<String>,
    Json(adjustment): Json<StockAdjustment>,
) -> Result<Json<Product>, ApiError> {
    scope.require_user()?;
    let Scope(mut ctx) = scope;
    let product = state
        .products
        .adjust_stock(&mut ctx, &id, adjustment.delta)
        .await?;
    Ok(Json(product))
}

async fn delete_product(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    scope.require_user()?;
    let Scope(mut ctx) = scope;
    state.products.delete_product(&mut ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
