use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::db::StoreError;

/// Errors surfaced by the service layer and mapped onto HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("comment {reply_to} does not belong to item {item_id}")]
    InvalidReply { reply_to: i64, item_id: i64 },

    #[error("malformed URL: {0}")]
    MalformedUrl(String),

    #[error("{0}")]
    Validation(String),

    #[error("login required")]
    Unauthorized,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    Conflict(String),

    #[error("comment thread of item {item_id} is broken at comments {comment_ids:?}")]
    BrokenThread { item_id: i64, comment_ids: Vec<i64> },

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(what) => AppError::Conflict(format!("{} already exists", what)),
            other => AppError::Store(other),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidReply { .. } => StatusCode::BAD_REQUEST,
            AppError::MalformedUrl(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BrokenThread { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status.is_server_error() {
            log::error!("{}", self);
            "internal server error".to_string()
        } else {
            log::debug!("request rejected: {}", self);
            self.to_string()
        };

        (
            status,
            Json(json!({ "status": "error", "error": message })),
        )
            .into_response()
    }
}
