use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

use crate::render;
use crate::session::AuthError;

/// Request-level failures. Configuration problems never reach here: they stop
/// the process before the server starts.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("login required")]
    Unauthorized,

    #[error("data unavailable: {0:#}")]
    DataUnavailable(anyhow::Error),

    #[error("not found")]
    NotFound,

    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Auth(err) => (
                StatusCode::UNAUTHORIZED,
                Html(render::login_page(Some(&err.to_string()))),
            )
                .into_response(),
            AppError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, Html(render::login_page(None))).into_response()
            }
            AppError::DataUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, Html(render::unavailable_page())).into_response()
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
            AppError::Internal(err) => {
                tracing::error!(error = %err, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}
