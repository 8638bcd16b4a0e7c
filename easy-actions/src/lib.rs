//! easy-actions: stores actions and forwards them to a remote service
//!
//! `POST /log?action=NAME` inserts `NAME` into `events_table`, posts it to the
//! `action-client` service URL and answers with the remote response body.

use easy_common::{
    async_trait, ComponentContext, ContentType, Dependency, Error, HttpBase, HttpDep,
    HttpRequest, HttpWith, Result, SqlDep,
};
use std::sync::Arc;
use tracing::{debug, info};

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS events_table (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    action TEXT NOT NULL UNIQUE
)
"#;

/// Component holding the outbound client settings
pub const ACTION_CLIENT_COMPONENT: &str = "action-client";

const ACTION_CLIENT_DEFAULTS: &str = "service-url: http://some-service.example/v1/action";

/// Client of the remote action service
#[derive(Debug, Clone)]
pub struct ActionDep {
    service_url: String,
    http: HttpDep,
}

impl ActionDep {
    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    /// POST `action` as the request body; returns the response body
    pub async fn create_action_request(&self, action: &str) -> Result<String> {
        let response = self
            .http
            .client()
            .post(&self.service_url)
            .body(action.to_string())
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("Action service answered {} for '{}'", status, action);
        if status.is_server_error() {
            return Err(Error::Internal(format!(
                "action service {} answered {}",
                self.service_url, status
            )));
        }
        Ok(body)
    }
}

#[async_trait]
impl Dependency for ActionDep {
    fn register(app: &mut HttpBase) {
        app.try_add_component(ACTION_CLIENT_COMPONENT, ACTION_CLIENT_DEFAULTS);
        HttpDep::register(app);
    }

    async fn build(ctx: &ComponentContext) -> Result<Self> {
        let service_url = ctx
            .find_component(ACTION_CLIENT_COMPONENT)
            .get_str("service-url")?;
        info!("Forwarding actions to {}", service_url);
        Ok(Self {
            service_url,
            http: HttpDep::build(ctx).await?,
        })
    }
}

/// Remote action client plus the database
pub type Deps = (ActionDep, SqlDep);

pub fn app<I, S>(args: I) -> HttpWith<Deps>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    HttpWith::<Deps>::new(args)
        .db_schema(SCHEMA)
        .default_content_type(ContentType::TextPlain)
        .post("/log", log_action)
}

async fn log_action(req: HttpRequest, deps: Arc<Deps>) -> Result<String> {
    let (actions, sql) = &*deps;
    let action = req.get_arg("action");

    sqlx::query("INSERT INTO events_table (action) VALUES (?1)")
        .bind(action)
        .execute(sql.pool())
        .await?;

    actions.create_action_request(action).await
}
