use crate::security::Denial;
use axum::{http::StatusCode, Json};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("denied: {0}")]
    Denied(#[from] Denial),
    #[error("not found")]
    NotFound,
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: &'static str,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Denied(_) => "Forbidden",
            AppError::NotFound => "NotFound",
            AppError::Internal(_) => "Internal",
        }
    }

    /// Fixed text sent to clients. Denial reasons and I/O details stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            AppError::Denied(_) => "Access denied",
            AppError::NotFound => "File not found",
            AppError::Internal(_) => "Internal server error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Denied(_) => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

pub fn into_response(err: &AppError) -> (StatusCode, Json<ErrorBody>) {
    (
        err.status(),
        Json(ErrorBody {
            code: err.code(),
            message: err.public_message(),
        }),
    )
}
