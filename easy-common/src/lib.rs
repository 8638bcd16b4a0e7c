//! # easy
//!
//! A small framework for writing HTTP services in a few lines:
//! - Service builder with routes, default content type and database schema
//! - Static YAML config with `$var`, `#env` and `#fallback` resolution
//! - Dependency injection (SQLite pool, HTTP client, user-defined)
//! - `--dump-config`, `--dump-schema` and `--dump-db-schema` for test setup
//! - Logging and graceful shutdown

pub mod app;
pub mod build_info;
pub mod cli;
pub mod config;
pub mod deps;
pub mod error;
pub mod http;
pub mod logging;
pub mod server;

pub use app::{HttpBase, HttpWith};
pub use build_info::version_line;
pub use config::{ComponentConfig, ConfigVars, StaticConfig};
pub use deps::{ComponentContext, Dependency, HttpDep, NoDeps, SqlDep};
pub use error::{Error, Result};
pub use http::{ContentType, HttpMethod, HttpRequest, HttpResponse};

/// Re-exported so dependency implementations need no direct dependency
pub use async_trait::async_trait;
