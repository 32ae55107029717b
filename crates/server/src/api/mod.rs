//! HTTP glue shared by the handlers: error mapping, request authentication
//! and the double-submit CSRF check.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    Json,
};
use server_api::{auth::authenticate, AuthenticatedPlayer};
use shared::{
    cookies::{cookie_value, csrf_token, ACCESS_TOKEN_COOKIE, CSRF_HEADER},
    error::{ApiError, ErrorCode},
};
use tracing::warn;

use crate::app_state::AppState;

pub(crate) type ApiFailure = (StatusCode, Json<ApiError>);

pub(crate) fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn failure(error: ApiError) -> ApiFailure {
    (status_for(error.code), Json(error))
}

/// All `Cookie` headers of a request folded into one `"a=b; c=d"` string.
pub(crate) fn cookie_header(headers: &HeaderMap) -> String {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ")
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Player resolved from `Authorization: Bearer` or the `access_token` cookie.
///
/// Cookie-authenticated unsafe requests must echo the `csrftoken` cookie in
/// the `X-CSRFToken` header. Bearer requests carry no ambient credentials and
/// skip the check.
pub(crate) struct CurrentPlayer(pub AuthenticatedPlayer);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentPlayer {
    type Rejection = ApiFailure;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(token) = bearer_token(&parts.headers) {
            let player = authenticate(&state.api, token).await.map_err(failure)?;
            return Ok(Self(player));
        }

        let cookies = cookie_header(&parts.headers);
        let token = cookie_value(&cookies, ACCESS_TOKEN_COOKIE).ok_or_else(|| {
            failure(ApiError::unauthorized(
                "Authentication credentials were not provided.",
            ))
        })?;

        if !parts.method.is_safe() {
            let expected = csrf_token(&cookies);
            let presented = parts
                .headers
                .get(CSRF_HEADER)
                .and_then(|value| value.to_str().ok());
            let verified = matches!(
                (expected.as_deref(), presented),
                (Some(expected), Some(presented)) if !expected.is_empty() && expected == presented
            );
            if !verified {
                warn!(path = %parts.uri.path(), "csrf verification failed");
                return Err(failure(ApiError::forbidden("CSRF verification failed")));
            }
        }

        let player = authenticate(&state.api, &token).await.map_err(failure)?;
        Ok(Self(player))
    }
}
