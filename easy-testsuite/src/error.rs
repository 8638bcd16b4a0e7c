//! Error types for test fixtures
//!
//! Every fixture failure is fatal to the test that hit it; nothing here is
//! retried.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Fixture result type
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service config error: {0}")]
    Service(#[from] easy_common::Error),

    /// Schema directory passed to discovery does not exist
    #[error("Schema directory not found: {}", .0.display())]
    SchemaDirMissing(PathBuf),

    /// Two schema files map onto the same logical database
    #[error("Database '{name}' defined twice: {} and {}", .first.display(), .second.display())]
    DuplicateDatabase {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// Schema text ends inside a quote, comment or trigger body
    #[error("Unterminated {0} in schema")]
    UnterminatedSql(&'static str),

    /// A schema file could not be split into statements
    #[error("Schema {}: {source}", .file.display())]
    SchemaFile {
        file: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// A schema statement failed while provisioning a scratch database
    #[error("Schema {} failed at statement {index}: {source}", .file.display())]
    SchemaStatement {
        file: PathBuf,
        index: usize,
        #[source]
        source: sqlx::Error,
    },

    #[error("Unknown database '{0}'")]
    UnknownDatabase(String),

    #[error("Unknown config hook '{0}'")]
    UnknownHook(String),

    /// External command exited unsuccessfully
    #[error("Command `{command}` failed with {status}: {stderr}")]
    Command {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    /// Service under test did not become ready
    #[error("Service startup failed: {0}")]
    Startup(String),
}
