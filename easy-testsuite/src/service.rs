//! Running a service binary under test
//!
//! [`ServiceBinary`] drives the one-shot dump commands. [`ServiceSession`]
//! wires the fixtures together: scratch databases from the dumped schema, a
//! mock server, config hooks, and finally the service process itself.

use easy_common::{ConfigVars, StaticConfig};
use serde_yaml::Value;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::client::ServiceClient;
use crate::database::ScratchDatabases;
use crate::hooks::{self, ConfigHooks};
use crate::mockserver::MockServer;
use crate::schema::{find_schemas, DEFAULT_SERVICE_NAME};
use crate::{Error, Result};

/// How long a started service gets to answer `GET /health`
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(20);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Start a service with the built-in hooks only
pub const NO_HOOKS: &[&str] = &[];

/// Path to a built service executable
#[derive(Debug, Clone)]
pub struct ServiceBinary {
    path: PathBuf,
}

impl ServiceBinary {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<bin> --dump-schema <dir>`
    pub async fn dump_schema(&self, dir: &Path) -> Result<()> {
        self.run([OsStr::new("--dump-schema"), dir.as_os_str()]).await
    }

    /// `<bin> --dump-db-schema <file>`
    pub async fn dump_db_schema(&self, file: &Path) -> Result<()> {
        self.run([OsStr::new("--dump-db-schema"), file.as_os_str()]).await
    }

    /// `<bin> --dump-config <file>`, parsed back
    pub async fn dump_config(&self, file: &Path) -> Result<StaticConfig> {
        self.run([OsStr::new("--dump-config"), file.as_os_str()]).await?;
        Ok(StaticConfig::load(file)?)
    }

    async fn run<I, S>(&self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        let command = format!(
            "{} {}",
            self.path.display(),
            args.iter().map(|a| a.to_string_lossy()).collect::<Vec<_>>().join(" ")
        );
        debug!("Running {}", command);

        let output = Command::new(&self.path).args(&args).output().await?;
        if !output.status.success() {
            return Err(Error::Command {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

/// Fixture state for one test against one service binary
pub struct ServiceSession {
    binary: ServiceBinary,
    dir: TempDir,
    mockserver: MockServer,
    hooks: ConfigHooks,
    databases: Option<ScratchDatabases>,
    log_level: String,
    env: Vec<(String, String)>,
    env_removed: Vec<String>,
}

impl ServiceSession {
    pub async fn new(binary: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            binary: ServiceBinary::new(binary),
            dir: TempDir::new()?,
            mockserver: MockServer::start().await?,
            hooks: ConfigHooks::new(),
            databases: None,
            log_level: "debug".to_string(),
            env: Vec::new(),
            env_removed: Vec::new(),
        })
    }

    pub fn binary(&self) -> &ServiceBinary {
        &self.binary
    }

    /// Session scratch directory, removed when the session is dropped
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn mockserver(&self) -> &MockServer {
        &self.mockserver
    }

    /// Register a hook that [`start`](Self::start) can select by name
    pub fn register_hook<F>(&mut self, name: &str, hook: F)
    where
        F: Fn(&mut Value, &mut ConfigVars) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.register(name, hook);
    }

    pub fn set_log_level(&mut self, level: &str) {
        self.log_level = level.to_string();
    }

    /// Environment variable passed to the service process
    pub fn env(&mut self, key: &str, value: &str) {
        self.env.push((key.to_string(), value.to_string()));
    }

    /// Environment variable the service process must not inherit
    pub fn env_remove(&mut self, key: &str) {
        self.env.retain(|(k, _)| k != key);
        self.env_removed.push(key.to_string());
    }

    /// Directory holding the service's dumped schema (`--dump-schema`)
    pub async fn schema_path(&self) -> Result<PathBuf> {
        let dir = self.schema_dir()?;
        self.binary.dump_schema(&dir).await?;
        Ok(dir)
    }

    /// Same directory, filled through `--dump-db-schema <dir>/<file_name>`
    pub async fn db_schema_path(&self, file_name: &str) -> Result<PathBuf> {
        let dir = self.schema_dir()?;
        self.binary.dump_db_schema(&dir.join(file_name)).await?;
        Ok(dir)
    }

    fn schema_dir(&self) -> Result<PathBuf> {
        let dir = self.dir.path().join("schemas");
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Scratch databases for every schema the service dumps
    pub async fn databases(&mut self) -> Result<&ScratchDatabases> {
        if self.databases.is_none() {
            let schema_path = self.schema_path().await?;
            self.provision(&[schema_path]).await?;
        }
        self.provisioned()
    }

    /// Scratch databases for the schemas found in `schema_dirs`
    ///
    /// Replaces databases provisioned earlier in the session.
    pub async fn databases_from(&mut self, schema_dirs: &[PathBuf]) -> Result<&ScratchDatabases> {
        self.provision(schema_dirs).await?;
        self.provisioned()
    }

    async fn provision(&mut self, schema_dirs: &[PathBuf]) -> Result<()> {
        let schemas = find_schemas(DEFAULT_SERVICE_NAME, schema_dirs)?;
        let root = self.dir.path().join("databases");
        std::fs::create_dir_all(&root)?;
        self.databases = Some(ScratchDatabases::create(&root, &schemas).await?);
        Ok(())
    }

    fn provisioned(&self) -> Result<&ScratchDatabases> {
        self.databases
            .as_ref()
            .ok_or_else(|| Error::Startup("databases not provisioned".to_string()))
    }

    /// Patch the dumped config and start the service
    ///
    /// Built-in hooks (listener port, log level and, when exactly one
    /// database was provisioned, its connection) run before `hook_names`.
    pub async fn start<S: AsRef<str>>(&mut self, hook_names: &[S]) -> Result<RunningService> {
        let config = self
            .binary
            .dump_config(&self.dir.path().join("config_dump.yaml"))
            .await?;
        let mut doc = config.document().clone();
        let mut vars = config.vars().clone();

        let port = free_port()?;
        let mut builtin = ConfigHooks::new();
        let mut names = vec![hooks::PORT_HOOK, hooks::LOG_LEVEL_HOOK];
        builtin.register(hooks::PORT_HOOK, hooks::listener_port_hook(port));
        builtin.register(hooks::LOG_LEVEL_HOOK, hooks::log_level_hook(self.log_level.clone()));
        if let Some(database) = self.databases.as_ref().and_then(ScratchDatabases::single) {
            let url = crate::database::sqlite_url(&database.path);
            builtin.register(hooks::DATABASE_HOOK, hooks::dbconnection_hook(url));
            names.push(hooks::DATABASE_HOOK);
        }
        builtin.apply(&names, &mut doc, &mut vars)?;
        self.hooks.apply(hook_names, &mut doc, &mut vars)?;

        let config_path = self.dir.path().join("config.yaml");
        std::fs::write(&config_path, serde_yaml::to_string(&doc)?)?;

        let mut command = Command::new(self.binary.path());
        for key in &self.env_removed {
            command.env_remove(key);
        }
        command
            .arg("--config")
            .arg(&config_path)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if !vars.is_empty() {
            let vars_path = self.dir.path().join("config_vars.yaml");
            std::fs::write(&vars_path, vars.to_yaml()?)?;
            command.arg("--config_vars").arg(&vars_path);
        }

        info!("Starting {} on port {}", self.binary.path().display(), port);
        let child = command.spawn()?;
        let mut service = RunningService {
            child,
            port,
            client: ServiceClient::new(format!("http://127.0.0.1:{}", port))?,
        };
        service.wait_ready(STARTUP_TIMEOUT).await?;
        Ok(service)
    }
}

/// Service process started by a session; killed on drop
pub struct RunningService {
    child: Child,
    port: u16,
    client: ServiceClient,
}

impl RunningService {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    pub async fn stop(mut self) -> Result<()> {
        self.child.kill().await?;
        Ok(())
    }

    async fn wait_ready(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Err(Error::Startup(format!("service exited early with {}", status)));
            }
            if let Ok(response) = self.client.get("/health").await {
                if response.status == reqwest::StatusCode::OK {
                    debug!("Service ready on port {}", self.port);
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(Error::Startup(format!(
                    "no healthy answer on port {} within {:?}",
                    self.port, timeout
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

/// Ask the OS for a currently unused localhost port
pub fn free_port() -> Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_port_is_nonzero() {
        assert_ne!(free_port().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failing_command_reports_status() {
        let binary = ServiceBinary::new("false");
        let dir = TempDir::new().unwrap();

        let err = binary.dump_schema(dir.path()).await.unwrap_err();

        match err {
            Error::Command { status, command, .. } => {
                assert!(!status.success());
                assert!(command.contains("--dump-schema"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_io_error() {
        let binary = ServiceBinary::new("/nonexistent/easy-service");
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            binary.dump_db_schema(&dir.path().join("x.sql")).await,
            Err(Error::Io(_))
        ));
    }
}
