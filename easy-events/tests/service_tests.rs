//! Black-box tests of the easy-events binary

use easy_testsuite::service::NO_HOOKS;
use easy_testsuite::ServiceSession;
use reqwest::StatusCode;

const BINARY: &str = env!("CARGO_BIN_EXE_easy-events");

async fn event_row(session: &mut ServiceSession, id: i64) -> Vec<(String, i64)> {
    let pool = session.databases().await.unwrap().pool("0_sqlite").unwrap();
    sqlx::query_as("SELECT action, host_id FROM events_table WHERE id = ?1")
        .bind(id)
        .fetch_all(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_log_action() {
    let mut session = ServiceSession::new(BINARY).await.unwrap();
    session.databases().await.unwrap();
    // Fallback host id only applies when HOST_ID is unset
    session.env_remove("HOST_ID");
    let service = session.start(NO_HOOKS).await.unwrap();

    let response = service.client().post("/log?action=test_1").await.unwrap();
    assert_eq!(response.status, StatusCode::OK);

    // '0_sqlite.sql' is what SqlDep dumps, so the database is '0_sqlite'
    let rows = event_row(&mut session, 1).await;
    assert_eq!(rows, vec![("test_1".to_string(), 42)]);
}

#[tokio::test]
async fn test_host_id_env_reaches_service() {
    let mut session = ServiceSession::new(BINARY).await.unwrap();
    session.databases().await.unwrap();
    session.env("HOST_ID", "1001");
    let service = session.start(NO_HOOKS).await.unwrap();

    service.client().post("/log?action=remote").await.unwrap();

    let rows = event_row(&mut session, 1).await;
    assert_eq!(rows, vec![("remote".to_string(), 1001)]);
}
