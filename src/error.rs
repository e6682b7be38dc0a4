//! Translation of handler failures into HTTP responses.

use axum::{
    extract::rejection::JsonRejection,
    BoxError,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::{
    auth::{jwt::AuthError, password::HashingError},
    users::store::StoreError,
};

pub type ApiResult<T> = Result<T, ApiError>;

/// Uniform error envelope returned to clients.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("method not allowed {0}")]
    MethodNotAllowed(Method),

    #[error("invalid token")]
    InvalidToken(AuthError),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Storage(#[source] sqlx::Error),

    #[error(transparent)]
    Hashing(#[from] HashingError),

    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("request timed out")]
    Timeout,

    #[error("unhandled middleware error: {0}")]
    Unhandled(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::MethodNotAllowed(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::InvalidToken(_) | ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::Storage(_)
            | ApiError::Hashing(_)
            | ApiError::Signing(_)
            | ApiError::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::MethodNotAllowed(_) => "method_not_allowed",
            ApiError::InvalidToken(_) => "auth",
            ApiError::InvalidCredentials => "credentials",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Storage(_) => "io",
            ApiError::Hashing(_) => "hashing",
            ApiError::Signing(_) => "signing",
            ApiError::Timeout => "timeout",
            ApiError::Unhandled(_) => "unhandled",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(kind = self.kind(), error = %self, "request failed");
            "internal server error".to_string()
        } else {
            match &self {
                ApiError::InvalidToken(reason) => {
                    warn!(kind = self.kind(), %reason, "request rejected")
                }
                _ => warn!(kind = self.kind(), error = %self, "request rejected"),
            }
            self.to_string()
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<BoxError> for ApiError {
    fn from(e: BoxError) -> Self {
        if e.is::<tower::timeout::error::Elapsed>() {
            ApiError::Timeout
        } else {
            ApiError::Unhandled(e.to_string())
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::InvalidToken(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => ApiError::NotFound(what),
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::Io(e) => ApiError::Storage(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Validation(e.body_text())
    }
}
