mod common;

use axum::http::{header, Method, StatusCode};
use serde_json::json;

use common::{AxumTestHelper, TestSetup};

#[tokio::test]
async fn test_register_sets_session() {
    let setup = TestSetup::new();

    let response = AxumTestHelper::post(
        &setup.router,
        "/register",
        json!({ "username": "alice", "email": "alice@example.com", "password": "password1" }),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);

    let body = response.json();
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["has_password"], true);
    assert!(body["user"].get("password_hash").is_none());

    let set_cookie = response.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=None"));

    let cookie = response.session_cookie().unwrap();
    let profile = AxumTestHelper::get(&setup.router, "/profile", Some(&cookie)).await;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.json()["email"], "alice@example.com");
}

#[tokio::test]
async fn test_register_validation_and_conflicts() {
    let setup = TestSetup::new();
    setup.register("alice").await;

    let response = AxumTestHelper::post(
        &setup.router,
        "/register",
        json!({ "username": "alice", "email": "new@example.com", "password": "password1" }),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let response = AxumTestHelper::post(
        &setup.router,
        "/register",
        json!({ "username": "bob", "email": "bob@example.com", "password": "short" }),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["status"], "error");
}

#[tokio::test]
async fn test_login_and_logout() {
    let setup = TestSetup::new();
    setup.register("alice").await;

    let response = AxumTestHelper::post(
        &setup.router,
        "/login",
        json!({ "username": "alice", "password": "wrong password" }),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = AxumTestHelper::post(
        &setup.router,
        "/login",
        json!({ "username": "alice", "password": "correct horse battery" }),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    let cookie = response.session_cookie().unwrap();

    let check = AxumTestHelper::get(&setup.router, "/api/check-login", Some(&cookie)).await;
    assert_eq!(check.json()["username"], "alice");

    let response = AxumTestHelper::post(&setup.router, "/logout", json!({}), Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.session_cookie().as_deref(), Some("talkatv_session="));
}

#[tokio::test]
async fn test_profile_requires_login() {
    let setup = TestSetup::new();

    let response = AxumTestHelper::get(&setup.router, "/profile", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_profile() {
    let setup = TestSetup::new();
    let alice = setup.register("alice").await;
    setup.register("bob").await;

    let response = AxumTestHelper::request(
        &setup.router,
        Method::PUT,
        "/profile",
        Some(json!({ "username": "alice", "email": "alice@new.example.com" })),
        Some(&alice),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["user"]["email"], "alice@new.example.com");

    let response = AxumTestHelper::request(
        &setup.router,
        Method::PUT,
        "/profile",
        Some(json!({ "username": "bob", "email": "alice@new.example.com" })),
        Some(&alice),
    )
    .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_change_password() {
    let setup = TestSetup::new();
    let alice = setup.register("alice").await;

    let response = AxumTestHelper::post(
        &setup.router,
        "/profile/change-password",
        json!({ "current_password": "not it", "new_password": "new password" }),
        Some(&alice),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = AxumTestHelper::post(
        &setup.router,
        "/profile/change-password",
        json!({ "current_password": "correct horse battery", "new_password": "new password" }),
        Some(&alice),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = AxumTestHelper::post(
        &setup.router,
        "/login",
        json!({ "username": "alice", "password": "new password" }),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
}
