//! `/users`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use mos_user::{NewUser, User, UserUpdate};

use super::error::ApiError;
use super::extract::Scope;
use super::{AppState, Page};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_user).get(list_users))
        .route("/{id}", get(get_user).patch(update_user).delete(delete_user))
}

async fn create_user(
    State(state): State<AppState>,
    Scope(mut ctx): Scope,
    Json(request): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state.users.create_user(&mut ctx, request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(
    State(state): State<AppState>,
    Scope(mut ctx): Scope,
    Query(page): Query<Page>,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = state.users.list_users(&mut ctx, page.offset, page.limit).await?;
    Ok(Json(users))
}

async fn get_user(
    State(state): State<AppState>,
    Scope(mut ctx): Scope,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.users.get_user(&mut ctx, &id).await?))
}

/// Users may only change themselves.
fn require_self(scope: &Scope, id: &str) -> Result<(), ApiError> {
    if scope.require_user()? != id {
        return Err(ApiError::forbidden("users may only modify their own account"));
    }
    Ok(())
}

async fn update_user(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<String>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<User>, ApiError> {
    require_self(&scope, &id)?;
    let Scope(mut ctx) = scope;
    Ok(Json(state.users.update_user(&mut ctx, &id, update).await?))
}

async fn delete_user(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_self(&scope, &id)?;
    let Scope(mut ctx) = scope;
    state.users.delete_user(&mut ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
