use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;

use crate::{
    account,
    errors::AppError,
    models::UserView,
    session::{removal_cookie, session_cookie, AuthenticatedUser},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct RegisterData {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileData {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordData {
    pub current_password: Option<String>,
    pub new_password: String,
}

/// Creates an account and logs it in.
pub async fn register_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterData>,
) -> Result<Response, AppError> {
    let user = account::register(
        state.store.as_ref(),
        &payload.username,
        &payload.email,
        &payload.password,
    )
    .await?;
    let jar = jar.add(session_cookie(&state.config, &user)?);

    Ok((
        StatusCode::CREATED,
        jar,
        Json(json!({ "status": "OK", "user": UserView::from(&user) })),
    )
        .into_response())
}

pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginData>,
) -> Result<Response, AppError> {
    let user = account::login(state.store.as_ref(), &payload.username, &payload.password).await?;
    let jar = jar.add(session_cookie(&state.config, &user)?);

    log::info!("user {} logged in", user.id);
    Ok((
        jar,
        Json(json!({ "status": "OK", "user": UserView::from(&user) })),
    )
        .into_response())
}

pub async fn logout_handler(jar: CookieJar) -> Response {
    (jar.remove(removal_cookie()), Json(json!({ "status": "OK" }))).into_response()
}

pub async fn get_profile_handler(AuthenticatedUser(user): AuthenticatedUser) -> Json<UserView> {
    Json(UserView::from(&user))
}

pub async fn update_profile_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<UpdateProfileData>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = account::update_profile(
        state.store.as_ref(),
        &user,
        &payload.username,
        &payload.email,
    )
    .await?;

    Ok(Json(json!({ "status": "OK", "user": UserView::from(&user) })))
}

pub async fn change_password_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<ChangePasswordData>,
) -> Result<Json<serde_json::Value>, AppError> {
    account::change_password(
        state.store.as_ref(),
        &user,
        payload.current_password.as_deref(),
        &payload.new_password,
    )
    .await?;

    Ok(Json(json!({ "status": "OK" })))
}
