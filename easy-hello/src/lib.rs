//! easy-hello: greetings plus a tiny key-value store
//!
//! Routes:
//! - `/hello` answers `Hello world`
//! - `/hello/to/{user}` greets the path argument
//! - `/hi?name=` greets the query argument
//! - `/kv?key=` reads a value (GET) or upserts `value` (POST)

use easy_common::{ContentType, Error, HttpMethod, HttpRequest, HttpWith, SqlDep};
use std::sync::Arc;
use tracing::debug;

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS key_value_table (
    key TEXT PRIMARY KEY,
    value TEXT
)
"#;

/// Service definition; `args` are the command-line arguments, program name first
pub fn app<I, S>(args: I) -> HttpWith<SqlDep>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    HttpWith::<SqlDep>::new(args)
        .schema(SCHEMA)
        .default_content_type(ContentType::TextPlain)
        .route("/hello", |_req: HttpRequest| async { "Hello world" }, &[])
        .route(
            "/hello/to/{user}",
            |req: HttpRequest| async move { format!("Hello, {}", req.get_path_arg("user")) },
            &[],
        )
        .route(
            "/hi",
            |req: HttpRequest| async move { format!("Hi, {}", req.get_arg("name")) },
            &[],
        )
        .route("/kv", key_value, &[HttpMethod::Get, HttpMethod::Post])
}

async fn key_value(req: HttpRequest, deps: Arc<SqlDep>) -> Result<String, Error> {
    let key = req.get_arg("key");

    if req.method() == HttpMethod::Get {
        let value: Option<Option<String>> =
            sqlx::query_scalar("SELECT value FROM key_value_table WHERE key = ?1")
                .bind(key)
                .fetch_optional(deps.pool())
                .await?;
        return value
            .map(Option::unwrap_or_default)
            .ok_or_else(|| Error::NotFound(format!("key '{}'", key)));
    }

    sqlx::query(
        "INSERT INTO key_value_table (key, value) VALUES (?1, ?2)
         ON CONFLICT (key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(req.get_arg("value"))
    .execute(deps.pool())
    .await?;
    debug!("Stored key '{}'", key);

    Ok(String::new())
}
