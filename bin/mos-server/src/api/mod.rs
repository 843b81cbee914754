//! HTTP API
//!
//! - `/health` - liveness and version
//! - `/users` - user module
//! - `/products` - product module, mutations require a bearer token
//! - `/auth` - registration, login and sessions

mod auth;
mod error;
mod extract;
mod products;
mod users;

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info_span, Span};

use mos_auth::AuthService;
use mos_product::ProductService;
use mos_user::UserService;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
    pub products: Arc<ProductService>,
    pub auth: Arc<AuthService>,
}

pub(crate) fn default_limit() -> u64 {
    20
}

#[derive(Debug, Deserialize)]
pub(crate) struct Page {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(extract::REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/users", users::router())
        .nest("/products", products::router())
        .nest("/auth", auth::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
