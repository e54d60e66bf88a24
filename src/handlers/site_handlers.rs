use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    errors::AppError,
    session::AuthenticatedUser,
    site::{add_site, list_sites},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateSiteData {
    pub domain: String,
}

pub async fn create_site_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<CreateSiteData>,
) -> Result<Response, AppError> {
    let (site, adopted) = add_site(state.store.as_ref(), &user, &payload.domain).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "OK", "site": site, "adopted": adopted })),
    )
        .into_response())
}

pub async fn list_sites_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let sites = list_sites(state.store.as_ref(), &user).await?;
    Ok(Json(json!({ "status": "OK", "sites": sites })))
}
