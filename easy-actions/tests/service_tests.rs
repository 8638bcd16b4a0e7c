//! Black-box tests of easy-actions with the action service mocked

use easy_common::ConfigVars;
use easy_testsuite::{set_component_field, MockRequest, MockResponse, ServiceSession};
use reqwest::StatusCode;
use serde_yaml::Value;

const BINARY: &str = env!("CARGO_BIN_EXE_easy-actions");

/// Point `action-client` at the session's mock server
const ACTIONS_SERVICE_HOOK: &str = "actions_service";

async fn session_with_mock() -> ServiceSession {
    let mut session = ServiceSession::new(BINARY).await.unwrap();

    let schema_path = session.db_schema_path("0_sqlite.sql").await.unwrap();
    session.databases_from(&[schema_path]).await.unwrap();

    let url = session.mockserver().url("/v1/action");
    session.register_hook(
        ACTIONS_SERVICE_HOOK,
        move |doc: &mut Value, _vars: &mut ConfigVars| {
            set_component_field(doc, "action-client", "service-url", url.as_str());
            Ok(())
        },
    );
    session
}

#[tokio::test]
async fn test_log_action() {
    let mut session = session_with_mock().await;
    session.mockserver().handler("/v1/action", |req: &MockRequest| {
        MockResponse::text(format!("done: {}", req.body_text()))
    });
    let service = session.start(&[ACTIONS_SERVICE_HOOK]).await.unwrap();

    let response = service.client().post("/log?action=test_1").await.unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text, "done: test_1");
    assert_eq!(session.mockserver().times_called("/v1/action"), 1);

    let pool = session.databases().await.unwrap().pool("0_sqlite").unwrap();
    let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, action FROM events_table WHERE id = 1")
        .fetch_all(pool)
        .await
        .unwrap();
    assert_eq!(rows, vec![(1, "test_1".to_string())]);
}

#[tokio::test]
async fn test_unknown_hook_fails_start() {
    let mut session = session_with_mock().await;

    let result = session.start(&["no_such_hook"]).await;

    assert!(matches!(result, Err(easy_testsuite::Error::UnknownHook(_))));
}
