pub mod api_handlers;
pub mod comment_handlers;
pub mod item_handlers;
pub mod site_handlers;
pub mod user_handlers;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::AppState;

/// Reports whether the store answers within two seconds. Returns 200 when it
/// does, otherwise 503.
pub async fn health_handler(State(state): State<AppState>) -> Response {
    use ::tokio::time::{timeout, Duration};

    let store_ok = timeout(Duration::from_secs(2), state.store.ping())
        .await
        .map(|result| result.is_ok())
        .unwrap_or(false);

    let body = json!({
        "store": store_ok,
        "status": if store_ok { "ok" } else { "degraded" }
    });

    let status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(body)).into_response()
}
