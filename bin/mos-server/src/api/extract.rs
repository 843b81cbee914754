//! Per-request context extraction

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use mos_core::RequestContext;
use uuid::Uuid;

use super::error::ApiError;
use super::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn request_context(parts: &Parts) -> RequestContext {
    let request_id = parts
        .headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    RequestContext::for_request(request_id)
}

/// Fresh [`RequestContext`] for one request.
///
/// Carries the request id (from `X-Request-ID`, or a new UUID) and, when a
/// bearer token is presented, the authenticated user id. A token that does
/// not resolve to a usable session rejects the request with 401.
pub struct Scope(pub RequestContext);

impl Scope {
    pub fn require_user(&self) -> Result<&str, ApiError> {
        self.0
            .user_id()
            .ok_or_else(|| ApiError::unauthorized("authentication required"))
    }
}

impl FromRequestParts<AppState> for Scope {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let mut ctx = request_context(parts);
        if let Some(token) = bearer_token(&parts.headers) {
            state.auth.authenticate(&mut ctx, token).await?;
        }
        Ok(Scope(ctx))
    }
}

/// [`RequestContext`] carrying only the request id. Any `Authorization`
/// header is ignored, so a client holding an expired token can still
/// register or log in.
pub struct Anonymous(pub RequestContext);

impl<S> FromRequestParts<S> for Anonymous
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Anonymous(request_context(parts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
