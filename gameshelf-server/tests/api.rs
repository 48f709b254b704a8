use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use gameshelf_library::{CatalogConfig, FallbackDatabase, MemoryDatabase, Shelf, TokenConfig};
use gameshelf_server::{router, ServerContext};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let shelf = Shelf::new(
        FallbackDatabase::new(None, MemoryDatabase::new()),
        TokenConfig::new("integration-test-secret"),
        CatalogConfig::default(),
    );

    let context = ServerContext {
        shelf: Arc::new(shelf),
        environment: "test".to_string(),
    };

    router(context, &[])
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, json)
}

async fn register(app: &Router, username: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "hunter22",
            "passwordConfirm": "hunter22"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["token"].as_str().unwrap().to_string()
}

fn hades() -> Value {
    json!({
        "title": "Hades",
        "platform": "PC",
        "status": "Playing",
        "rating": 9.5,
        "genres": ["Roguelike"],
        "notes": "Try the spear"
    })
}

#[tokio::test]
async fn test_library_scenario() {
    let app = app();
    let ana = register(&app, "ana").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "ana@example.com", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, game) = send(&app, Method::POST, "/api/games", Some(&ana), Some(hades())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(game["title"], "Hades");
    assert_eq!(game["notes"], "Try the spear");

    let (status, _) = send(&app, Method::POST, "/api/games", Some(&ana), Some(hades())).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let bob = register(&app, "bob").await;
    let (status, _) = send(&app, Method::POST, "/api/games", Some(&bob), Some(hades())).await;
    assert_eq!(status, StatusCode::CREATED);

    let uri = format!("/api/games/{}", game["id"].as_str().unwrap());
    let (status, _) = send(&app, Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, games) = send(&app, Method::GET, "/api/games/my", Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(games.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_update_and_delete() {
    let app = app();
    let ana = register(&app, "ana").await;

    let (_, game) = send(&app, Method::POST, "/api/games", Some(&ana), Some(hades())).await;
    let uri = format!("/api/games/{}", game["id"].as_str().unwrap());

    let (status, updated) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&ana),
        Some(json!({ "status": "Completado", "rating": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "Completed");
    assert_eq!(updated["rating"], Value::Null);
    assert_eq!(updated["genres"], json!(["Roguelike"]));

    let (status, _) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&ana),
        Some(json!({ "rating": 10.01 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&ana), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_registration_rules() {
    let app = app();
    register(&app, "ana").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": "ana",
            "email": "someone@example.com",
            "password": "hunter22",
            "passwordConfirm": "hunter22"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User already registered");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": "carla",
            "email": "carla@example.com",
            "password": "hunter22",
            "passwordConfirm": "hunter23"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Passwords do not match");
}

#[tokio::test]
async fn test_sessions() {
    let app = app();
    let ana = register(&app, "ana").await;

    let (status, _) = send(&app, Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/api/auth/me", Some("forged"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::GET, "/api/auth/me", Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "ana");
    assert!(body["user"].get("password").is_none());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "ana", "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ana@example.com");

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/auth/me",
        Some(&ana),
        Some(json!({ "bio": "Completionist", "isPublic": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["bio"], "Completionist");
    assert_eq!(body["user"]["isPublic"], false);
}

#[tokio::test]
async fn test_catalog_without_key() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/api/games/popular", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));
    assert!(body[0].get("inLibrary").is_none());

    let ana = register(&app, "ana").await;
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/games/explore?ordering=-rating&pageSize=abc",
        Some(&ana),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "Grand Theft Auto V");
    assert_eq!(body[0]["inLibrary"], false);

    let (status, body) = send(&app, Method::GET, "/api/games/search/hades", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let long_query = format!("/api/games/search/{}", "a".repeat(101));
    let (status, _) = send(&app, Method::GET, &long_query, None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_and_docs() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["environment"], "test");
    assert_eq!(body["storage"], "volatile");

    let (status, body) = send(&app, Method::GET, "/api.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"].get("/api/games/{id}").is_some());

    let (status, _) = send(&app, Method::GET, "/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
