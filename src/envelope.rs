use axum::{
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use regex::Regex;
use serde::Serialize;

use crate::errors::AppError;

/// Checks that a JSONP callback name is a plain JavaScript identifier path.
pub fn validate_callback(callback: &str) -> Result<(), AppError> {
    let pattern = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$.]*$").map_err(anyhow::Error::from)?;
    if !pattern.is_match(callback) {
        return Err(AppError::Validation(format!(
            "invalid callback name: {}",
            callback
        )));
    }
    Ok(())
}

/// Serializes `body` as JSON, or as JSONP when a callback is given.
pub fn respond<T: Serialize>(body: &T, callback: Option<&str>) -> Result<Response, AppError> {
    match callback {
        None => Ok(Json(body).into_response()),
        Some(callback) => {
            validate_callback(callback)?;
            let json = serde_json::to_string(body).map_err(anyhow::Error::from)?;
            Ok((
                [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
                format!("{}({});", callback, json),
            )
                .into_response())
        }
    }
}
