//! Error types for the HTTP layer.
//!
//! [`ApiError`] is what handlers return; it maps every failure to a status
//! code and an [`ErrorBody`]. [`ServerError`] covers startup.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ck_core::bus::BusError;
use ck_core::runner::RunnerError;
use ck_core::store::StoreError;
use ck_protocol::ErrorBody;
use thiserror::Error;
use tracing::error;

/// Errors returned by request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request input, rejected before touching the runner.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(e) => store_status(e),
            ApiError::Runner(e) => match e {
                RunnerError::AlreadyRunning(_) | RunnerError::NotIdle { .. } => {
                    StatusCode::CONFLICT
                }
                RunnerError::SessionNotFound(_) | RunnerError::Bus(BusError::NotFound(_)) => {
                    StatusCode::NOT_FOUND
                }
                RunnerError::Bus(_) => StatusCode::INTERNAL_SERVER_ERROR,
                RunnerError::Store(e) => store_status(e),
            },
        }
    }
}

fn store_status(error: &StoreError) -> StatusCode {
    match error {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::InvalidTransition { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for request handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

pub type ServerResult<T> = Result<T, ServerError>;
