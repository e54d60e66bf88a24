use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    comment::{get_context, post_comment},
    envelope::{respond, validate_callback},
    errors::AppError,
    item::get_or_add_item,
    session::{AuthenticatedUser, CurrentUser},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct GetCommentsParams {
    pub item_url: Option<String>,
    pub item_title: Option<String>,
    pub callback: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PostCommentData {
    pub item: i64,
    pub comment: String,
    pub reply_to: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub callback: Option<String>,
}

/// Returns the discussion of the page at `item_url`, registering the page on
/// first sight.
pub async fn get_comments_handler(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Query(params): Query<GetCommentsParams>,
) -> Result<Response, AppError> {
    let item_url = params
        .item_url
        .as_deref()
        .filter(|url| !url.is_empty())
        .ok_or(AppError::NotFound("item"))?;
    // Reject a bad callback before the page is registered.
    if let Some(callback) = params.callback.as_deref() {
        validate_callback(callback)?;
    }

    let item = get_or_add_item(
        state.store.as_ref(),
        item_url,
        params.item_title.as_deref().filter(|title| !title.is_empty()),
    )
    .await?;
    let context = get_context(state.store.as_ref(), &item, viewer.as_ref()).await?;

    respond(&context, params.callback.as_deref())
}

pub async fn post_comment_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<PostCommentData>,
) -> Result<Response, AppError> {
    let comment = post_comment(
        state.store.as_ref(),
        state.notifier.as_ref(),
        &state.config,
        &user,
        payload.item,
        &payload.comment,
        payload.reply_to,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "OK", "comment": comment })),
    )
        .into_response())
}

pub async fn check_login_handler(
    CurrentUser(viewer): CurrentUser,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AppError> {
    let body = match viewer {
        Some(user) => json!({ "status": "OK", "username": user.username }),
        None => json!({ "status": false }),
    };

    respond(&body, params.callback.as_deref())
}
