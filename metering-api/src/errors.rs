use crate::engine::EngineError;
use crate::query::QueryError;
use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;

/// Failure of a single API request. Every variant is answered by the handler
/// that produced it.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("cannot obtain user info")]
    Unauthenticated,

    #[error(transparent)]
    MalformedQuery(#[from] QueryError),

    #[error(transparent)]
    BackendRejected(#[from] EngineError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthenticated,
    MalformedQuery,
    Engine,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::MalformedQuery => "malformed_query",
            ErrorKind::Engine => "engine",
        }
    }
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Unauthenticated => ErrorKind::Unauthenticated,
            ApiError::MalformedQuery(_) => ErrorKind::MalformedQuery,
            ApiError::BackendRejected(_) => ErrorKind::Engine,
        }
    }

    pub fn status(&self) -> StatusCode {
        // Engine failures are reported as the caller's fault, transient or not.
        match self.kind() {
            ErrorKind::Unauthenticated => StatusCode::FORBIDDEN,
            ErrorKind::MalformedQuery | ErrorKind::Engine => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Serialize)]
struct ApiErrorResponse {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorResponse {
            message: self.to_string(),
        });

        (self.status(), body).into_response()
    }
}
