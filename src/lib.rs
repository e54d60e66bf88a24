use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::Request,
    http::{HeaderName, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

pub mod account;
pub mod comment;
pub mod config;
pub mod db;
pub mod envelope;
pub mod errors;
pub mod handlers;
pub mod item;
pub mod models;
pub mod notification;
pub mod session;
pub mod site;

use config::{split_list, Config};
use db::Store;
use handlers::{
    api_handlers::{check_login_handler, get_comments_handler, post_comment_handler},
    comment_handlers::{list_comments_by_url_handler, list_comments_handler},
    health_handler,
    item_handlers::{list_items_handler, list_items_page_handler},
    site_handlers::{create_site_handler, list_sites_handler},
    user_handlers::{
        change_password_handler, get_profile_handler, login_handler, logout_handler,
        register_handler, update_profile_handler,
    },
};
use notification::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Arc<Config>,
}

fn has_wildcard(names: &[String]) -> bool {
    names.iter().any(|name| name == "*")
}

/// Builds the CORS policy. The request origin is echoed back because
/// credentialed requests may not use a wildcard. Preflight requests are
/// answered here and never reach a handler.
fn cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let header_names = split_list(&config.cors_allow_headers);
    let method_names = split_list(&config.cors_allow_methods);

    let wildcard = has_wildcard(&header_names) || has_wildcard(&method_names);
    if config.cors_allow_credentials && wildcard {
        anyhow::bail!(
            "TALKATV_CORS_ALLOW_HEADERS and TALKATV_CORS_ALLOW_METHODS cannot be \"*\" \
             while TALKATV_CORS_ALLOW_CREDENTIALS is on"
        );
    }

    let headers: AllowHeaders = if has_wildcard(&header_names) {
        AllowHeaders::any()
    } else {
        header_names
            .iter()
            .filter_map(|name| HeaderName::from_bytes(name.as_bytes()).ok())
            .collect::<Vec<_>>()
            .into()
    };
    let methods: AllowMethods = if has_wildcard(&method_names) {
        AllowMethods::any()
    } else {
        method_names
            .iter()
            .filter_map(|name| Method::from_bytes(name.as_bytes()).ok())
            .collect::<Vec<_>>()
            .into()
    };

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(config.cors_allow_credentials)
        .allow_headers(headers)
        .allow_methods(methods)
        .max_age(Duration::from_secs(config.cors_max_age)))
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    log::info!(
        "{} {} {} {}ms",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

/// Fails when the CORS settings cannot be combined.
pub fn create_router(state: AppState) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.config)?;

    Ok(Router::new()
        .route(
            "/api/comments",
            get(get_comments_handler).post(post_comment_handler),
        )
        .route("/api/check-login", get(check_login_handler))
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .route(
            "/profile",
            get(get_profile_handler).put(update_profile_handler),
        )
        .route("/profile/change-password", post(change_password_handler))
        .route("/sites", post(create_site_handler).get(list_sites_handler))
        .route("/comment/list", get(list_comments_by_url_handler))
        .route("/comment/list/:item_id", get(list_comments_handler))
        .route("/item/list", get(list_items_handler))
        .route("/item/list/page/:page", get(list_items_page_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(middleware::from_fn(log_requests))
        .layer(cors))
}
