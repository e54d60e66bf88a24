use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{Json, Redirect},
};
use serde::Deserialize;

use crate::{
    comment::get_context,
    errors::AppError,
    item::get_item,
    models::CommentContext,
    session::CurrentUser,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct ListByUrlParams {
    pub url: Option<String>,
}

/// Discussion of an item that already exists.
pub async fn list_comments_handler(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
    CurrentUser(viewer): CurrentUser,
) -> Result<Json<CommentContext>, AppError> {
    let item = get_item(state.store.as_ref(), item_id).await?;
    let context = get_context(state.store.as_ref(), &item, viewer.as_ref()).await?;
    Ok(Json(context))
}

/// Redirects to the comment list of a known page, given by `url` or by the
/// `Referer` header.
pub async fn list_comments_by_url_handler(
    State(state): State<AppState>,
    Query(params): Query<ListByUrlParams>,
    headers: HeaderMap,
) -> Result<Redirect, AppError> {
    let url = params
        .url
        .filter(|url| !url.is_empty())
        .or_else(|| {
            headers
                .get(header::REFERER)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.to_string())
        })
        .ok_or(AppError::NotFound("item"))?;

    let item = state
        .store
        .get_item_by_url(&url)
        .await?
        .ok_or(AppError::NotFound("item"))?;

    Ok(Redirect::to(&format!("/comment/list/{}", item.id)))
}
