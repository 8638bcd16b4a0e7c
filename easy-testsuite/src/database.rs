//! Scratch SQLite databases created from discovered schemas
//!
//! Each logical database gets its own file under the session directory,
//! recreated from scratch so a session never sees rows from a previous one.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::schema::DatabaseSchema;
use crate::{Error, Result};

/// One provisioned database
#[derive(Debug, Clone)]
pub struct ScratchDatabase {
    pub schema: DatabaseSchema,
    pub path: PathBuf,
    pub pool: SqlitePool,
}

/// All databases provisioned for a test session, keyed by logical name
#[derive(Debug, Default)]
pub struct ScratchDatabases {
    databases: BTreeMap<String, ScratchDatabase>,
}

impl ScratchDatabases {
    pub async fn create(
        root_dir: &Path,
        schemas: &BTreeMap<String, DatabaseSchema>,
    ) -> Result<Self> {
        let mut databases = BTreeMap::new();
        for (name, schema) in schemas {
            let database = create_database(root_dir, schema).await?;
            databases.insert(name.clone(), database);
        }
        Ok(Self { databases })
    }

    pub fn names(&self) -> Vec<&str> {
        self.databases.keys().map(String::as_str).collect()
    }

    pub fn get(&self, dbname: &str) -> Result<&ScratchDatabase> {
        self.databases
            .get(dbname)
            .ok_or_else(|| Error::UnknownDatabase(dbname.to_string()))
    }

    pub fn pool(&self, dbname: &str) -> Result<&SqlitePool> {
        Ok(&self.get(dbname)?.pool)
    }

    /// URL a service can use as its `dbconnection`
    pub fn connection_url(&self, dbname: &str) -> Result<String> {
        Ok(sqlite_url(&self.get(dbname)?.path))
    }

    /// The only database, if exactly one was provisioned
    pub fn single(&self) -> Option<&ScratchDatabase> {
        if self.databases.len() == 1 {
            self.databases.values().next()
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }
}

pub fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}?mode=rwc", path.display())
}

async fn create_database(root_dir: &Path, schema: &DatabaseSchema) -> Result<ScratchDatabase> {
    let path = root_dir.join(format!("{}.db", schema.physical_name()));
    if path.exists() {
        debug!("Removing stale database {}", path.display());
        std::fs::remove_file(&path)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    let statements = schema.statements()?;
    let mut tx = pool.begin().await?;
    for (index, (file, statement)) in statements.iter().enumerate() {
        sqlx::raw_sql(statement)
            .execute(&mut *tx)
            .await
            .map_err(|source| Error::SchemaStatement {
                file: file.clone(),
                index,
                source,
            })?;
    }
    tx.commit().await?;

    info!(
        "Created database '{}' at {} ({} statements)",
        schema.dbname,
        path.display(),
        statements.len()
    );

    Ok(ScratchDatabase {
        schema: schema.clone(),
        path,
        pool,
    })
}
