//! Dependencies injected into route handlers
//!
//! A dependency type registers the components it needs on the application
//! (`Dependency::register`) and is built once at startup from the resolved
//! static config (`Dependency::build`). Handlers receive it as `Arc<D>`.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::app::HttpBase;
use crate::config::{ComponentConfig, StaticConfig};
use crate::{Error, Result};

/// Component name under which dependency-specific settings live
pub const DEPENDENCIES_COMPONENT: &str = "easy-dependencies";

/// Component name of the SQLite database
pub const SQLITE_COMPONENT: &str = "sqlite-database";

/// File name `--dump-schema` writes the database schema to
///
/// Schema discovery names the database after the file stem, so the logical
/// database of every `SqlDep` service is `0_sqlite`.
pub const SCHEMA_FILE_NAME: &str = "0_sqlite.sql";

const SQLITE_DEFAULTS: &str = r#"
dbconnection: sqlite://easy.db?mode=rwc
initialize-schema: true
max-connections: 5
"#;

/// Everything a dependency may consult while being built
#[derive(Debug, Clone)]
pub struct ComponentContext {
    config: StaticConfig,
    schema: Option<String>,
    http_client: reqwest::Client,
}

impl ComponentContext {
    pub fn new(config: StaticConfig, schema: Option<String>) -> Self {
        Self {
            config,
            schema,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &StaticConfig {
        &self.config
    }

    /// Config section of one component
    pub fn find_component(&self, name: &str) -> ComponentConfig {
        self.config.component(name)
    }

    /// Database schema registered with `HttpWith::schema`
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Shared outbound HTTP client
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }
}

/// A set of resources handlers can use
#[async_trait]
pub trait Dependency: Send + Sync + Sized + 'static {
    /// Add the components and config this dependency requires
    fn register(_app: &mut HttpBase) {}

    /// Build the dependency from the resolved config
    async fn build(ctx: &ComponentContext) -> Result<Self>;
}

/// No dependencies at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDeps;

#[async_trait]
impl Dependency for NoDeps {
    async fn build(_ctx: &ComponentContext) -> Result<Self> {
        Ok(NoDeps)
    }
}

/// SQLite connection pool
///
/// Config section `sqlite-database`:
/// - `dbconnection`: sqlx connection URL
/// - `initialize-schema`: apply the registered schema at startup
/// - `max-connections`: pool size
#[derive(Debug, Clone)]
pub struct SqlDep {
    pool: SqlitePool,
}

impl SqlDep {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Dependency for SqlDep {
    fn register(app: &mut HttpBase) {
        app.try_add_component(SQLITE_COMPONENT, SQLITE_DEFAULTS);
    }

    async fn build(ctx: &ComponentContext) -> Result<Self> {
        let config = ctx.find_component(SQLITE_COMPONENT);
        let url = config.get_str("dbconnection")?;
        let max_connections = config.get_u32_or("max-connections", 5)?;
        if max_connections == 0 {
            return Err(Error::Config(format!(
                "{}: 'max-connections' must be at least 1",
                SQLITE_COMPONENT
            )));
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&url)
            .await?;
        info!("✓ Connected to database: {}", url);

        if config.get_bool_or("initialize-schema", true)? {
            if let Some(schema) = ctx.schema() {
                sqlx::raw_sql(schema).execute(&pool).await?;
                debug!("Applied database schema ({} bytes)", schema.len());
            }
        }

        Ok(Self { pool })
    }
}

/// Shared outbound HTTP client
#[derive(Debug, Clone)]
pub struct HttpDep {
    client: reqwest::Client,
}

impl HttpDep {
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl Dependency for HttpDep {
    async fn build(ctx: &ComponentContext) -> Result<Self> {
        Ok(Self {
            client: ctx.http_client().clone(),
        })
    }
}

#[async_trait]
impl<A: Dependency, B: Dependency> Dependency for (A, B) {
    fn register(app: &mut HttpBase) {
        A::register(app);
        B::register(app);
    }

    async fn build(ctx: &ComponentContext) -> Result<Self> {
        Ok((A::build(ctx).await?, B::build(ctx).await?))
    }
}

#[async_trait]
impl<A: Dependency, B: Dependency, C: Dependency> Dependency for (A, B, C) {
    fn register(app: &mut HttpBase) {
        A::register(app);
        B::register(app);
        C::register(app);
    }

    async fn build(ctx: &ComponentContext) -> Result<Self> {
        Ok((
            A::build(ctx).await?,
            B::build(ctx).await?,
            C::build(ctx).await?,
        ))
    }
}
