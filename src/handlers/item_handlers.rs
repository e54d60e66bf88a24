use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{errors::AppError, item::list_items, AppState};

#[derive(Debug, Deserialize)]
pub struct ListItemsParams {
    pub page: Option<u32>,
}

async fn item_page(state: &AppState, page: u32) -> Result<Json<serde_json::Value>, AppError> {
    let items = list_items(state.store.as_ref(), page, state.config.items_per_page).await?;
    Ok(Json(json!({ "status": "OK", "page": page, "items": items })))
}

/// All known items, newest first. `page` defaults to 1.
pub async fn list_items_handler(
    State(state): State<AppState>,
    Query(params): Query<ListItemsParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    item_page(&state, params.page.unwrap_or(1)).await
}

pub async fn list_items_page_handler(
    State(state): State<AppState>,
    Path(page): Path<u32>,
) -> Result<Json<serde_json::Value>, AppError> {
    item_page(&state, page).await
}
