use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::{
    auth::jwt::{AuthError, JwtKeys},
    error::ApiError,
};

pub const TOKEN_HEADER: &str = "x-jwt-token";

/// Rejects the request with 403 unless `x-jwt-token` carries a valid token.
/// On success the decoded claims are stored in the request extensions.
pub async fn require_token(
    State(keys): State<JwtKeys>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let claims = match token.ok_or(AuthError::Missing).and_then(|t| keys.validate(t)) {
        Ok(c) => c,
        Err(reason) => return ApiError::InvalidToken(reason).into_response(),
    };

    debug!(user_id = claims.user_id, "token accepted");
    req.extensions_mut().insert(claims);
    next.run(req).await
}
