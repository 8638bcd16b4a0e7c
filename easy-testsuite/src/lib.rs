//! Functional-test fixtures for easy services
//!
//! Typical flow inside a test:
//! 1. [`ServiceSession::new`] with the service binary path
//! 2. [`ServiceSession::databases`] to provision scratch SQLite databases
//!    from the schema the service dumps
//! 3. register config hooks, e.g. pointing an outbound client at the
//!    session's [`MockServer`]
//! 4. [`ServiceSession::start`] and talk to the service through
//!    [`RunningService::client`]

pub mod client;
pub mod database;
pub mod error;
pub mod hooks;
pub mod mockserver;
pub mod schema;
pub mod service;

pub use client::{ClientResponse, ServiceClient};
pub use database::{ScratchDatabase, ScratchDatabases};
pub use error::{Error, Result};
pub use hooks::{set_component_field, ConfigHook, ConfigHooks};
pub use mockserver::{MockRequest, MockResponse, MockServer};
pub use schema::{find_schemas, split_statements, DatabaseSchema};
pub use service::{RunningService, ServiceBinary, ServiceSession};
