use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration, Utc};
use hmac_sha256::HMAC;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::errors::AppError;
use crate::models::User;
use crate::AppState;

pub const SESSION_COOKIE: &str = "talkatv_session";

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct SessionClaims {
    user_id: i64,
    expires: i64,
}

/// Signs a session token for `user_id`, valid until `expires`.
///
/// The token is `base64url(claims) "." base64url(HMAC-SHA256(claims, key))`.
pub fn sign_session(key: &str, user_id: i64, expires: DateTime<Utc>) -> anyhow::Result<String> {
    let claims = serde_json::to_vec(&SessionClaims {
        user_id,
        expires: expires.timestamp(),
    })?;
    let payload = base64::encode_config(&claims, base64::URL_SAFE_NO_PAD);
    let hmac = HMAC::mac(payload.as_bytes(), key.as_bytes());

    Ok(format!(
        "{}.{}",
        payload,
        base64::encode_config(hmac, base64::URL_SAFE_NO_PAD)
    ))
}

/// Returns the user id of a genuine, unexpired token.
pub fn verify_session(key: &str, token: &str, now: DateTime<Utc>) -> Option<i64> {
    let (payload, signature) = token.split_once('.')?;
    let signature = base64::decode_config(signature, base64::URL_SAFE_NO_PAD).ok()?;

    let expected = HMAC::mac(payload.as_bytes(), key.as_bytes());
    if !constant_time_eq::constant_time_eq(&expected, &signature) {
        log::debug!("rejected session token with a bad signature");
        return None;
    }

    let claims = base64::decode_config(payload, base64::URL_SAFE_NO_PAD).ok()?;
    let claims: SessionClaims = serde_json::from_slice(&claims).ok()?;
    if claims.expires <= now.timestamp() {
        return None;
    }

    Some(claims.user_id)
}

/// Cookie carrying a fresh session for `user`.
pub fn session_cookie(config: &Config, user: &User) -> anyhow::Result<Cookie<'static>> {
    let expires = Utc::now() + Duration::seconds(config.session_ttl_seconds);
    let token = sign_session(&config.session_key, user.id, expires)?;

    Ok(Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::None)
        .secure(config.secure_cookies)
        .build())
}

/// Cookie that removes the session when passed to `CookieJar::remove`.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// The logged in user, if the request carries a valid session.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<User>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        let key = &state.config.session_key;
        let user_id = match jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| verify_session(key, cookie.value(), Utc::now()))
        {
            Some(user_id) => user_id,
            None => return Ok(CurrentUser(None)),
        };

        Ok(CurrentUser(state.store.get_user(user_id).await?))
    }
}

/// Like `CurrentUser`, but rejects anonymous requests with 401.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await? {
            CurrentUser(Some(user)) => Ok(AuthenticatedUser(user)),
            CurrentUser(None) => Err(AppError::Unauthorized),
        }
    }
}
