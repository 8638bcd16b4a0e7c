//! Service builder
//!
//! ```rust,ignore
//! HttpWith::<SqlDep>::new(std::env::args())
//!     .schema(SCHEMA)
//!     .default_content_type(ContentType::TextPlain)
//!     .route("/hello", |_req: HttpRequest| async { "Hello world" }, &HttpMethod::ALL)
//!     .run()
//!     .await
//! ```
//!
//! Every route becomes a handler component named after its path. The
//! handler section stores `path` and `method`, so a config file can remap
//! either without rebuilding the service.

use axum::Router;
use futures::future::BoxFuture;
use serde_yaml::{Mapping, Value};
use std::future::Future;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cli::{Cli, Command};
use crate::config::{ConfigVars, StaticConfig};
use crate::deps::{ComponentContext, Dependency, NoDeps, SCHEMA_FILE_NAME};
use crate::http::{ContentType, HttpMethod, HttpRequest, HttpResponse, IntoHttpResponse};
use crate::{logging, server, Error, Result};

/// Type-erased route handler
pub type BoxedHandler<D> =
    Arc<dyn Fn(HttpRequest, Arc<D>) -> BoxFuture<'static, Result<HttpResponse>> + Send + Sync>;

/// Marker for handlers taking only the request
pub struct RequestOnly;
/// Marker for handlers taking the request and the dependencies
pub struct WithDeps;

/// Async function usable as a route handler
///
/// Implemented for `Fn(HttpRequest) -> impl Future` and
/// `Fn(HttpRequest, Arc<D>) -> impl Future` whose output converts into a
/// response (`String`, `&'static str`, `HttpResponse`, or a `Result` of those).
pub trait Handler<D, M>: Send + Sync + 'static {
    fn into_boxed(self) -> BoxedHandler<D>;
}

impl<D, F, Fut, R> Handler<D, RequestOnly> for F
where
    D: Send + Sync + 'static,
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHttpResponse + Send + 'static,
{
    fn into_boxed(self) -> BoxedHandler<D> {
        Arc::new(move |req: HttpRequest, _deps: Arc<D>| -> BoxFuture<'static, Result<HttpResponse>> {
            let fut = self(req);
            Box::pin(async move { fut.await.into_http_response() })
        })
    }
}

impl<D, F, Fut, R> Handler<D, WithDeps> for F
where
    D: Send + Sync + 'static,
    F: Fn(HttpRequest, Arc<D>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHttpResponse + Send + 'static,
{
    fn into_boxed(self) -> BoxedHandler<D> {
        Arc::new(move |req: HttpRequest, deps: Arc<D>| -> BoxFuture<'static, Result<HttpResponse>> {
            let fut = self(req, deps);
            Box::pin(async move { fut.await.into_http_response() })
        })
    }
}

/// One registered route
pub(crate) struct RouteEntry<D> {
    pub(crate) component: String,
    pub(crate) handler: BoxedHandler<D>,
}

/// Dependency-independent part of the builder
///
/// Dependency registration receives this type to add components and config.
/// Malformed YAML fragments are remembered and reported by `run`.
pub struct HttpBase {
    config: StaticConfig,
    schema: Option<String>,
    default_content_type: Option<ContentType>,
    pending_error: Option<Error>,
}

impl HttpBase {
    fn new() -> Self {
        Self {
            config: StaticConfig::base(),
            schema: None,
            default_content_type: None,
            pending_error: None,
        }
    }

    fn record(&mut self, result: Result<()>) {
        if let Err(err) = result {
            warn!("Rejected service configuration: {}", err);
            self.pending_error.get_or_insert(err);
        }
    }

    pub fn default_content_type(&mut self, content_type: ContentType) {
        self.default_content_type = Some(content_type);
    }

    /// Merge a YAML fragment of component sections into the static config
    pub fn add_components_config(&mut self, fragment: &str) {
        let result = self.config.merge_components(fragment);
        self.record(result);
    }

    /// Add a component section unless the component is already configured
    pub fn try_add_component(&mut self, name: &str, section: &str) {
        let result = self.config.try_add_component(name, section).map(|_| ());
        self.record(result);
    }

    /// Database schema; later calls append to it
    pub fn schema(&mut self, schema: &str) {
        match &mut self.schema {
            Some(existing) => {
                existing.push_str(";\n");
                existing.push_str(schema.trim());
            }
            None => self.schema = Some(schema.trim().to_string()),
        }
    }

    pub fn port(&mut self, port: u16) {
        self.add_components_config(&format!("server:\n    listener:\n        port: {}\n", port));
    }

    pub fn log_level(&mut self, level: tracing::Level) {
        let level = level.as_str().to_ascii_lowercase();
        self.add_components_config(&format!(
            "logging:\n    loggers:\n        default:\n            level: {}\n",
            level
        ));
    }

    pub fn config(&self) -> &StaticConfig {
        &self.config
    }

    fn add_handler_component(&mut self, path: &str, methods: &[HttpMethod]) {
        if self.config.has_component(path) {
            self.record(Err(Error::Config(format!("route '{}' is already registered", path))));
            return;
        }
        let mut section = Mapping::new();
        section.insert(Value::from("path"), Value::from(path));
        section.insert(Value::from("method"), Value::from(HttpMethod::join(methods)));
        self.config.set_component(path, Value::Mapping(section));
    }
}

/// Service builder parameterized by its dependency type
pub struct HttpWith<D: Dependency = NoDeps> {
    args: Vec<String>,
    base: HttpBase,
    routes: Vec<RouteEntry<D>>,
    build_info: Option<String>,
    registered: bool,
    _deps: PhantomData<fn() -> D>,
}

impl<D: Dependency> HttpWith<D> {
    /// Start a service from its command-line arguments (program name first)
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            base: HttpBase::new(),
            routes: Vec::new(),
            build_info: None,
            registered: false,
            _deps: PhantomData,
        }
    }

    pub fn default_content_type(mut self, content_type: ContentType) -> Self {
        self.base.default_content_type(content_type);
        self
    }

    /// Register `handler` for `path`, answering `methods`
    ///
    /// `path` may contain `{name}` placeholders, read with
    /// `HttpRequest::get_path_arg`.
    pub fn route<M, H>(mut self, path: &str, handler: H, methods: &[HttpMethod]) -> Self
    where
        H: Handler<D, M>,
    {
        let all = HttpMethod::ALL;
        let methods = if methods.is_empty() { &all[..] } else { methods };
        self.base.add_handler_component(path, methods);
        self.routes.push(RouteEntry {
            component: path.to_string(),
            handler: handler.into_boxed(),
        });
        self
    }

    pub fn get<M, H: Handler<D, M>>(self, path: &str, handler: H) -> Self {
        self.route(path, handler, &[HttpMethod::Get])
    }

    pub fn post<M, H: Handler<D, M>>(self, path: &str, handler: H) -> Self {
        self.route(path, handler, &[HttpMethod::Post])
    }

    pub fn del<M, H: Handler<D, M>>(self, path: &str, handler: H) -> Self {
        self.route(path, handler, &[HttpMethod::Delete])
    }

    pub fn put<M, H: Handler<D, M>>(self, path: &str, handler: H) -> Self {
        self.route(path, handler, &[HttpMethod::Put])
    }

    pub fn patch<M, H: Handler<D, M>>(self, path: &str, handler: H) -> Self {
        self.route(path, handler, &[HttpMethod::Patch])
    }

    pub fn add_components_config(mut self, fragment: &str) -> Self {
        self.base.add_components_config(fragment);
        self
    }

    pub fn try_add_component(mut self, name: &str, section: &str) -> Self {
        self.base.try_add_component(name, section);
        self
    }

    pub fn schema(mut self, schema: &str) -> Self {
        self.base.schema(schema);
        self
    }

    /// Same as `schema`
    pub fn db_schema(self, schema: &str) -> Self {
        self.schema(schema)
    }

    pub fn port(mut self, port: u16) -> Self {
        self.base.port(port);
        self
    }

    pub fn log_level(mut self, level: tracing::Level) -> Self {
        self.base.log_level(level);
        self
    }

    /// Version line logged once logging is up, e.g. version and git hash
    pub fn build_info(mut self, info: impl Into<String>) -> Self {
        self.build_info = Some(info.into());
        self
    }

    fn finalize(&mut self) -> Result<()> {
        if !self.registered {
            D::register(&mut self.base);
            self.registered = true;
        }
        match self.base.pending_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Built-in static config, with dependency registration applied
    pub fn static_config(&mut self) -> Result<StaticConfig> {
        self.finalize()?;
        Ok(self.base.config.clone())
    }

    pub fn database_schema(&self) -> Option<&str> {
        self.base.schema.as_deref()
    }

    /// Build dependencies and the router for a resolved config
    pub async fn router_with(mut self, config: StaticConfig) -> Result<Router> {
        self.finalize()?;
        let ctx = ComponentContext::new(config.clone(), self.base.schema.clone());
        let deps = Arc::new(D::build(&ctx).await?);
        server::build_router(
            &config,
            self.routes,
            deps,
            self.base.default_content_type,
        )
    }

    /// Router over the built-in static config
    pub async fn router(mut self) -> Result<Router> {
        let config = self.static_config()?;
        self.router_with(config).await
    }

    /// Dump requested artifacts or serve until shutdown
    pub async fn run(mut self) -> Result<()> {
        let cli = Cli::from_args(&self.args);
        self.finalize()?;

        if let Some(command) = cli.command() {
            return self.dump(command);
        }

        let mut config = match &cli.config {
            Some(path) => StaticConfig::load(path)?,
            None => self.base.config.clone(),
        };
        if let Some(path) = &cli.config_vars {
            config = config.with_vars(ConfigVars::load(path)?);
        }

        logging::init(&config)?;
        info!(
            "Starting {} {} with {} route(s)",
            self.service_name(),
            self.build_info.as_deref().unwrap_or(env!("CARGO_PKG_VERSION")),
            self.routes.len()
        );

        let port = config.listener_port()?;
        let router = self.router_with(config).await?;
        server::serve(router, port).await
    }

    fn service_name(&self) -> String {
        self.args
            .first()
            .and_then(|arg0| Path::new(arg0).file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "easy service".to_string())
    }

    fn dump(&self, command: Command) -> Result<()> {
        match command {
            Command::DumpConfig(path) => {
                std::fs::write(&path, self.base.config.to_yaml()?)?;
                info!("Static config written to {}", path.display());
            }
            Command::DumpSchema(dir) => {
                std::fs::create_dir_all(&dir)?;
                match self.database_schema() {
                    Some(schema) => {
                        let path = dir.join(SCHEMA_FILE_NAME);
                        std::fs::write(&path, schema)?;
                        info!("Database schema written to {}", path.display());
                    }
                    None => warn!("Service has no database schema, nothing dumped"),
                }
            }
            Command::DumpDbSchema(path) => {
                let schema = self.database_schema().ok_or_else(|| {
                    Error::Config("service has no database schema".to_string())
                })?;
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, schema)?;
                info!("Database schema written to {}", path.display());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> HttpWith {
        HttpWith::<NoDeps>::new(["svc"])
    }

    #[test]
    fn test_routes_become_handler_components() {
        let mut app = app()
            .route("/hello", |_req: HttpRequest| async { "Hello world" }, &[])
            .post("/log", |_req: HttpRequest| async { String::new() });
        let config = app.static_config().unwrap();

        let hello = config.component("/hello");
        assert_eq!(hello.get_str("path").unwrap(), "/hello");
        assert_eq!(hello.get_str("method").unwrap(), "GET,POST,DELETE,PUT,PATCH");
        assert_eq!(config.component("/log").get_str("method").unwrap(), "POST");
    }

    #[test]
    fn test_duplicate_route_reported() {
        let mut app = app()
            .get("/log", |_req: HttpRequest| async { "a" })
            .post("/log", |_req: HttpRequest| async { "b" });
        assert!(app.static_config().is_err());
    }

    #[test]
    fn test_bad_fragment_reported() {
        let mut app = app().add_components_config("- not\n- a mapping\n");
        assert!(matches!(app.static_config(), Err(Error::Config(_))));
    }

    #[test]
    fn test_port_and_log_level() {
        let mut app = app().port(9999).log_level(tracing::Level::WARN);
        let config = app.static_config().unwrap();
        assert_eq!(config.listener_port().unwrap(), 9999);
        assert_eq!(config.log_level().unwrap(), "warn");
    }

    #[test]
    fn test_schema_appends() {
        let app = app().schema("CREATE TABLE a (x INT)").db_schema("CREATE TABLE b (y INT)");
        assert_eq!(
            app.database_schema(),
            Some("CREATE TABLE a (x INT);\nCREATE TABLE b (y INT)")
        );
    }

    #[test]
    fn test_dump_db_schema_without_schema_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let app = app();
        let result = app.dump(Command::DumpDbSchema(dir.path().join("0_sqlite.sql")));
        assert!(result.is_err());
    }

    #[test]
    fn test_dump_schema_writes_named_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let app = app().schema("CREATE TABLE a (x INT)");
        app.dump(Command::DumpSchema(dir.path().join("schemas"))).unwrap();

        let dumped = std::fs::read_to_string(dir.path().join("schemas").join(SCHEMA_FILE_NAME)).unwrap();
        assert_eq!(dumped, "CREATE TABLE a (x INT)");
    }

    #[test]
    fn test_service_name_from_argv0() {
        let app = HttpWith::<NoDeps>::new(["/usr/bin/easy-hello", "--config", "x"]);
        assert_eq!(app.service_name(), "easy-hello");
    }
}
