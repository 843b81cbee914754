//! `/auth`

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use mos_auth::{RegisterRequest, Registration, SessionGrant};

use super::error::ApiError;
use super::extract::{bearer_token, Anonymous, Scope};
use super::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(session))
        .route("/password", post(change_password))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionInfo {
    user_id: String,
    request_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordChangedResponse {
    sessions_revoked: u64,
}

async fn register(
    State(state): State<AppState>,
    Anonymous(mut ctx): Anonymous,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Registration>), ApiError> {
    let registration = state.auth.register(&mut ctx, request).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

async fn login(
    State(state): State<AppState>,
    Anonymous(mut ctx): Anonymous,
    Json(request): Json<LoginRequest>,
) -> Result<Json<SessionGrant>, ApiError> {
    let grant = state
        .auth
        .login(&mut ctx, &request.username, &request.password)
        .await?;
    Ok(Json(grant))
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Scope(mut ctx): Scope,
) -> Result<StatusCode, ApiError> {
    let token =
        bearer_token(&headers).ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;
    state.auth.logout(&mut ctx, token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn session(scope: Scope) -> Result<Json<SessionInfo>, ApiError> {
    let user_id = scope.require_user()?.to_string();
    Ok(Json(SessionInfo {
        user_id,
        request_id: scope.0.request_id().map(String::from),
    }))
}

async fn change_password(
    State(state): State<AppState>,
    scope: Scope,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<PasswordChangedResponse>, ApiError> {
    let user_id = scope.require_user()?.to_string();
    let Scope(mut ctx) = scope;
    let sessions_revoked = state
        .auth
        .change_password(
            &mut ctx,
            &user_id,
            &request.current_password,
            &request.new_password,
        )
        .await?;
    Ok(Json(PasswordChangedResponse { sessions_revoked }))
}
