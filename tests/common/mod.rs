#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use envconfig::Envconfig;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use talkatv::{
    config::Config,
    create_router,
    db::{MemoryStore, Store},
    notification::{CommentNotification, Notifier},
    AppState,
};

/// Notifier that keeps every notification for inspection.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<CommentNotification>>,
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &CommentNotification) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Test utilities and common setup
pub struct TestSetup {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub config: Arc<Config>,
    pub router: Router,
}

impl TestSetup {
    pub fn new() -> Self {
        let mut env = HashMap::new();
        env.insert("TALKATV_STORAGE".to_string(), "memory".to_string());
        env.insert("TALKATV_SECURE_COOKIES".to_string(), "false".to_string());
        env.insert(
            "TALKATV_SESSION_KEY".to_string(),
            "integration-test-key".to_string(),
        );
        let config = Arc::new(Config::init_from_hashmap(&env).unwrap());

        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let router = create_router(AppState {
            store: store.clone() as Arc<dyn Store>,
            notifier: notifier.clone() as Arc<dyn Notifier>,
            config: config.clone(),
        })
        .unwrap();

        Self {
            store,
            notifier,
            config,
            router,
        }
    }

    /// Registers a user and returns the session cookie to send with later
    /// requests.
    pub async fn register(&self, username: &str) -> String {
        let body = json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "correct horse battery",
        });
        let response =
            AxumTestHelper::request(&self.router, Method::POST, "/register", Some(body), None)
                .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);

        response
            .session_cookie()
            .expect("register response sets a session cookie")
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }

    /// The `name=value` part of the session cookie set by this response.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find(|value| value.starts_with("talkatv_session="))
            .and_then(|value| value.split(';').next())
            .map(|pair| pair.to_string())
    }
}

/// Helper functions for Axum testing
pub struct AxumTestHelper;

impl AxumTestHelper {
    pub async fn request(
        router: &Router,
        method: Method,
        path: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> TestResponse {
        let mut request = Request::builder().method(method).uri(path);

        if body.is_some() {
            request = request.header(header::CONTENT_TYPE, "application/json");
        }
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }

        let body = match body {
            Some(body) => Body::from(body.to_string()),
            None => Body::empty(),
        };
        let response = router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();

        TestResponse {
            status,
            headers,
            body: String::from_utf8(body.to_vec()).unwrap(),
        }
    }

    pub async fn get(router: &Router, path: &str, cookie: Option<&str>) -> TestResponse {
        Self::request(router, Method::GET, path, None, cookie).await
    }

    pub async fn post(
        router: &Router,
        path: &str,
        body: Value,
        cookie: Option<&str>,
    ) -> TestResponse {
        Self::request(router, Method::POST, path, Some(body), cookie).await
    }
}

/// Percent-encodes a value for use in a query string.
pub fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
