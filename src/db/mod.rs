//! Database adapter.
//!
//! [`DbClient`] is the capability interface the controllers talk to; a
//! [`DbConnector`] opens a fresh client per request from a named connection
//! profile. There is no pool: every client is closed when the request is done.

pub mod mock;
pub mod postgres;

pub use mock::{MockConnector, MockDbClient};
pub use postgres::PostgresClient;

use crate::config::{ConfigService, ConnectionProfile, Driver};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// A statement batch to execute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    pub query: String,
}

impl QueryOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
}

/// Outcome of one statement of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub fields: Vec<Field>,
    pub rows: Vec<Map<String, Value>>,
    #[serde(rename = "rowCount")]
    pub row_count: u64,
}

/// One column of one table, with key flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TableMeta {
    pub table_catalog: String,
    pub table_schema: String,
    pub table_name: String,
    pub table_type: String,
    pub column_name: String,
    pub ordinal_position: i32,
    pub data_type: String,
    pub column_default: Option<String>,
    pub character_maximum_length: Option<i32>,
    pub numeric_precision: Option<i32>,
    pub is_nullable: bool,
    pub is_pk: bool,
    pub is_fk: bool,
}

/// One parameter of one routine. Parameterless routines yield a single row
/// with the parameter columns unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoutineMeta {
    pub routine_catalog: String,
    pub routine_schema: String,
    pub routine_name: String,
    pub routine_type: Option<String>,
    pub return_data_type: Option<String>,
    pub parameter_name: Option<String>,
    pub ordinal_position: Option<i32>,
    pub parameter_mode: Option<String>,
    pub is_result: Option<bool>,
    pub data_type: Option<String>,
    pub character_maximum_length: Option<i32>,
    pub parameter_default: Option<String>,
}

/// Operations the controllers need from a database connection.
///
/// Empty `schema`, `table` and `routine` filters match everything.
#[async_trait]
pub trait DbClient: Send {
    async fn connect(profile: &ConnectionProfile) -> Result<Self>
    where
        Self: Sized;

    /// Runs every statement in `options.query`, one result per statement.
    async fn execute(&mut self, options: &QueryOptions) -> Result<Vec<QueryResult>>;

    async fn table_meta(&mut self, schema: &str, table: &str) -> Result<Vec<TableMeta>>;

    async fn routine_meta(&mut self, schema: &str, routine: &str) -> Result<Vec<RoutineMeta>>;

    async fn close(&mut self) -> Result<()>;
}

/// Source of database connections, addressed by profile name.
#[async_trait]
pub trait DbConnector: Send + Sync + 'static {
    /// Names of the profiles that can be opened, sorted.
    fn profile_names(&self) -> Result<Vec<String>>;

    /// Opens a new connection using profile `name`.
    async fn open(&self, name: &str) -> Result<Box<dyn DbClient>>;
}

/// Connector reading `connection.<name>.json` profiles from a directory.
///
/// Fields a profile leaves unset are taken from the `PG*` environment.
#[derive(Debug, Clone)]
pub struct ProfileConnector {
    dir: PathBuf,
    config: ConfigService,
}

impl ProfileConnector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            config: ConfigService::new(),
        }
    }

    pub fn with_config(mut self, config: ConfigService) -> Self {
        self.config = config;
        self
    }

    /// Loads profile `name` with environment defaults applied.
    pub fn profile(&self, name: &str) -> Result<ConnectionProfile> {
        Ok(ConnectionProfile::load(&self.dir, name)?.with_defaults(&self.config))
    }
}

#[async_trait]
impl DbConnector for ProfileConnector {
    fn profile_names(&self) -> Result<Vec<String>> {
        ConnectionProfile::list_names(&self.dir)
    }

    async fn open(&self, name: &str) -> Result<Box<dyn DbClient>> {
        let profile = self.profile(name)?;
        match profile.driver {
            Driver::Postgres => {
                let client = PostgresClient::connect(&profile).await?;
                Ok(Box::new(client))
            }
        }
    }
}

/// Closes `client`, logging instead of failing so the caller's result stands.
pub async fn close_quietly(mut client: Box<dyn DbClient>) {
    if let Err(e) = client.close().await {
        tracing::warn!("Failed to close database connection: {}", e);
    }
}
