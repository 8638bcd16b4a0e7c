//! easy-events: records actions tagged with the id of the host that saw them
//!
//! `POST /log?action=NAME` inserts `(NAME, host_id)` into `events_table`.
//! The host id comes from the `easy-dependencies` component: environment
//! variable `HOST_ID` when set, 42 otherwise.

use easy_common::deps::DEPENDENCIES_COMPONENT;
use easy_common::{
    async_trait, ComponentContext, ContentType, Dependency, HttpBase, HttpRequest, HttpWith,
    Result, SqlDep,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS events_table (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    action TEXT NOT NULL UNIQUE,
    host_id INTEGER
)
"#;

const HOST_ID_CONFIG: &str = r#"
easy-dependencies:
    host_id#env: HOST_ID
    host_id#fallback: 42
"#;

/// Database access plus the configured host id
#[derive(Debug, Clone)]
pub struct EventsDep {
    sql: SqlDep,
    host_id: i64,
}

impl EventsDep {
    pub fn pool(&self) -> &SqlitePool {
        self.sql.pool()
    }

    pub fn host_id(&self) -> i64 {
        self.host_id
    }
}

#[async_trait]
impl Dependency for EventsDep {
    fn register(app: &mut HttpBase) {
        SqlDep::register(app);
        app.add_components_config(HOST_ID_CONFIG);
    }

    async fn build(ctx: &ComponentContext) -> Result<Self> {
        let sql = SqlDep::build(ctx).await?;
        let host_id = ctx.find_component(DEPENDENCIES_COMPONENT).get_i64("host_id")?;
        info!("Recording events as host {}", host_id);
        Ok(Self { sql, host_id })
    }
}

pub fn app<I, S>(args: I) -> HttpWith<EventsDep>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    HttpWith::<EventsDep>::new(args)
        .schema(SCHEMA)
        .default_content_type(ContentType::TextPlain)
        .post("/log", log_action)
}

async fn log_action(req: HttpRequest, deps: Arc<EventsDep>) -> Result<String> {
    let action = req.require_arg("action")?;
    sqlx::query("INSERT INTO events_table (action, host_id) VALUES (?1, ?2)")
        .bind(action)
        .bind(deps.host_id())
        .execute(deps.pool())
        .await?;
    debug!("Logged action '{}'", action);
    Ok(String::new())
}
