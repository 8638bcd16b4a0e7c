//! In-process tests of routing, dispatch and content types
//!
//! Routers are driven with `oneshot`, no socket involved.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use easy_common::config::set_path;
use easy_common::{
    ContentType, Error, HttpMethod, HttpRequest, HttpResponse, HttpWith, NoDeps, SqlDep,
};
use serde_yaml::Value;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

/// Test helper: build a request without body
fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: read the whole body as text
async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    String::from_utf8(bytes.to_vec()).expect("Body should be UTF-8")
}

fn greeting_app() -> HttpWith<NoDeps> {
    HttpWith::<NoDeps>::new(["greeting"])
        .default_content_type(ContentType::TextPlain)
        .get("/hello", |_req: HttpRequest| async { "Hello world" })
        .get("/hello/to/{user}", |req: HttpRequest| async move {
            format!("Hello, {}", req.get_path_arg("user"))
        })
        .route(
            "/echo",
            |req: HttpRequest| async move { format!("{} {}", req.method(), req.body_text()) },
            &[HttpMethod::Post, HttpMethod::Put],
        )
        .get("/json", |_req: HttpRequest| async {
            HttpResponse::new("{}").content_type(ContentType::ApplicationJson)
        })
        .get("/missing", |_req: HttpRequest| async {
            Err::<String, _>(Error::NotFound("nothing here".to_string()))
        })
}

// =============================================================================
// Dispatch
// =============================================================================

#[tokio::test]
async fn test_static_route() {
    let app = greeting_app().router().await.unwrap();

    let response = app.oneshot(test_request("GET", "/hello")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .contains("text/plain"));
    assert_eq!(body_text(response).await, "Hello world");
}

#[tokio::test]
async fn test_path_placeholder() {
    let app = greeting_app().router().await.unwrap();

    let response = app.oneshot(test_request("GET", "/hello/to/flusk")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Hello, flusk");
}

#[tokio::test]
async fn test_method_restriction() {
    let app = greeting_app().router().await.unwrap();

    let response = app
        .clone()
        .oneshot(test_request("DELETE", "/echo"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let request = Request::builder()
        .method("PUT")
        .uri("/echo")
        .body(Body::from("payload"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "PUT payload");
}

#[tokio::test]
async fn test_explicit_content_type_kept() {
    let app = greeting_app().router().await.unwrap();

    let response = app.oneshot(test_request("GET", "/json")).await.unwrap();

    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json; charset=utf-8"
    );
}

#[tokio::test]
async fn test_handler_error_maps_to_status() {
    let app = greeting_app().router().await.unwrap();

    let response = app.oneshot(test_request("GET", "/missing")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "Not found: nothing here");
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = greeting_app().router().await.unwrap();

    let response = app.oneshot(test_request("GET", "/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_head_answers_on_get_route() {
    let app = greeting_app().router().await.unwrap();

    let response = app.oneshot(test_request("HEAD", "/hello")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "");
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let app = greeting_app().router().await.unwrap();

    let response = app.oneshot(test_request("GET", "/nope")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Config-driven mounting
// =============================================================================

#[tokio::test]
async fn test_config_remaps_handler_path() {
    let mut app = greeting_app();
    let mut config = app.static_config().unwrap();
    set_path(
        config.document_mut(),
        &["components_manager", "components", "/hello", "path"],
        Value::from("/greet"),
    );
    let router = app.router_with(config).await.unwrap();

    let moved = router.clone().oneshot(test_request("GET", "/greet")).await.unwrap();
    assert_eq!(body_text(moved).await, "Hello world");

    let old = router.oneshot(test_request("GET", "/hello")).await.unwrap();
    assert_eq!(old.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_config_restricts_methods() {
    let mut app = HttpWith::<NoDeps>::new(["svc"])
        .route("/any", |_req: HttpRequest| async { "ok" }, &[]);
    let mut config = app.static_config().unwrap();
    set_path(
        config.document_mut(),
        &["components_manager", "components", "/any", "method"],
        Value::from("GET"),
    );
    let router = app.router_with(config).await.unwrap();

    let response = router.oneshot(test_request("POST", "/any")).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_health_path_is_reserved() {
    let app = HttpWith::<NoDeps>::new(["svc"]).get("/health", |_req: HttpRequest| async { "mine" });

    let result = app.router().await;

    assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("reserved")));
}

#[tokio::test]
async fn test_placeholder_names_must_agree() {
    let app = HttpWith::<NoDeps>::new(["svc"])
        .get("/a/{x}", |_req: HttpRequest| async { "x" })
        .post("/a/{y}", |_req: HttpRequest| async { "y" });

    let result = app.router().await;

    assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("placeholder")));
}

#[tokio::test]
async fn test_config_remap_onto_clashing_path() {
    let mut app = greeting_app();
    let mut config = app.static_config().unwrap();
    set_path(
        config.document_mut(),
        &["components_manager", "components", "/hello", "path"],
        Value::from("/hello/to/{name}"),
    );

    let result = app.router_with(config).await;

    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_config_remap_onto_health() {
    let mut app = greeting_app();
    let mut config = app.static_config().unwrap();
    set_path(
        config.document_mut(),
        &["components_manager", "components", "/json", "path"],
        Value::from("/health"),
    );

    let result = app.router_with(config).await;

    assert!(matches!(result, Err(Error::Config(_))));
}

// =============================================================================
// Dependencies
// =============================================================================

#[tokio::test]
async fn test_handler_receives_dependencies() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut app = HttpWith::<SqlDep>::new(["counter"])
        .schema("CREATE TABLE IF NOT EXISTS hits (id INTEGER PRIMARY KEY AUTOINCREMENT)")
        .post("/hit", |_req: HttpRequest, deps: Arc<SqlDep>| async move {
            sqlx::query("INSERT INTO hits DEFAULT VALUES")
                .execute(deps.pool())
                .await?;
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM hits")
                .fetch_one(deps.pool())
                .await?;
            Ok::<_, Error>(count.to_string())
        });

    let mut config = app.static_config().unwrap();
    set_path(
        config.document_mut(),
        &["components_manager", "components", "sqlite-database", "dbconnection"],
        Value::from(format!("sqlite://{}?mode=rwc", dir.path().join("hits.db").display())),
    );
    let router = app.router_with(config).await.unwrap();

    let first = router.clone().oneshot(test_request("POST", "/hit")).await.unwrap();
    assert_eq!(body_text(first).await, "1");
    let second = router.oneshot(test_request("POST", "/hit")).await.unwrap();
    assert_eq!(body_text(second).await, "2");
}
