use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
    Argon2,
};

use crate::db::Store;
use crate::errors::AppError;
use crate::models::{NewUser, User};

pub const MAX_USERNAME_LENGTH: usize = 60;
pub const MAX_EMAIL_LENGTH: usize = 255;
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub fn validate_username(username: &str) -> Result<(), AppError> {
    let length = username.chars().count();
    if length == 0 || length > MAX_USERNAME_LENGTH {
        return Err(AppError::Validation(format!(
            "username must be between 1 and {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
    {
        return Err(AppError::Validation(
            "username may only contain letters, digits, '_', '.' and '-'".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    let length = email.chars().count();
    if length < 3 || length > MAX_EMAIL_LENGTH || !email.contains('@') {
        return Err(AppError::Validation(format!(
            "{} is not a valid email address",
            email
        )));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Hashes `password` into an Argon2 PHC string.
async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_string();

    let hash = tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| anyhow::anyhow!("failed to hash password: {}", err))
    })
    .await
    .map_err(anyhow::Error::from)??;

    Ok(hash)
}

async fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let password = password.to_string();
    let hash = hash.to_string();

    let valid = tokio::task::spawn_blocking(move || {
        let parsed = match PasswordHash::new(&hash) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::warn!("stored password hash is unreadable: {}", err);
                return false;
            }
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .map_err(anyhow::Error::from)?;

    Ok(valid)
}

pub async fn register(
    store: &dyn Store,
    username: &str,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let username = username.trim();
    let email = email.trim();
    validate_username(username)?;
    validate_email(email)?;
    validate_password(password)?;

    let user = store
        .insert_user(NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: Some(hash_password(password).await?),
        })
        .await?;

    log::info!("registered user {} ({})", user.id, user.username);
    Ok(user)
}

pub async fn login(store: &dyn Store, username: &str, password: &str) -> Result<User, AppError> {
    let user = store
        .get_user_by_username(username.trim())
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let hash = user
        .password_hash
        .as_deref()
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(password, hash).await? {
        log::debug!("wrong password for user {}", user.id);
        return Err(AppError::InvalidCredentials);
    }

    Ok(user)
}

pub async fn update_profile(
    store: &dyn Store,
    user: &User,
    username: &str,
    email: &str,
) -> Result<User, AppError> {
    let username = username.trim();
    let email = email.trim();
    validate_username(username)?;
    validate_email(email)?;

    Ok(store.update_user_profile(user.id, username, email).await?)
}

/// Sets a new password. Accounts that already have one must confirm it.
pub async fn change_password(
    store: &dyn Store,
    user: &User,
    current: Option<&str>,
    new: &str,
) -> Result<(), AppError> {
    if let Some(hash) = user.password_hash.as_deref() {
        let current = current.ok_or(AppError::InvalidCredentials)?;
        if !verify_password(current, hash).await? {
            return Err(AppError::InvalidCredentials);
        }
    }
    validate_password(new)?;

    store
        .set_user_password(user.id, &hash_password(new).await?)
        .await?;

    log::info!("user {} changed their password", user.id);
    Ok(())
}
