//! In-memory connector for tests and offline runs.

use crate::config::ConnectionProfile;
use crate::db::{DbClient, DbConnector, Field, QueryOptions, QueryResult, RoutineMeta, TableMeta};
use crate::error::{DbscopeError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Shared {
    opened: AtomicUsize,
    closed: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl Shared {
    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

/// Connector handing out [`MockDbClient`]s that share canned data and counters.
#[derive(Clone, Default)]
pub struct MockConnector {
    profiles: Vec<String>,
    tables: Vec<TableMeta>,
    routines: Vec<RoutineMeta>,
    execute_error: Option<String>,
    shared: Arc<Shared>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            profiles: vec!["default".to_string()],
            ..Default::default()
        }
    }

    pub fn with_profiles(mut self, names: &[&str]) -> Self {
        self.profiles = names.iter().map(|name| name.to_string()).collect();
        self.profiles.sort();
        self
    }

    pub fn with_tables(mut self, tables: Vec<TableMeta>) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_routines(mut self, routines: Vec<RoutineMeta>) -> Self {
        self.routines = routines;
        self
    }

    /// Makes every `execute` fail with `message`.
    pub fn failing_execute(mut self, message: impl Into<String>) -> Self {
        self.execute_error = Some(message.into());
        self
    }

    pub fn opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Calls made on clients, e.g. `open(default)` or `table_meta(public, users)`.
    pub fn calls(&self) -> Vec<String> {
        self.shared
            .calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DbConnector for MockConnector {
    fn profile_names(&self) -> Result<Vec<String>> {
        Ok(self.profiles.clone())
    }

    async fn open(&self, name: &str) -> Result<Box<dyn DbClient>> {
        if !self.profiles.iter().any(|profile| profile == name) {
            return Err(DbscopeError::config(format!(
                "cannot read connection profile '{name}'"
            )));
        }
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        self.shared.record(format!("open({name})"));
        Ok(Box::new(MockDbClient {
            connector: self.clone(),
            open: true,
        }))
    }
}

/// Client answering from its connector's canned data.
///
/// `execute` returns one result per `;`-separated statement, each with a
/// single row echoing the statement text.
pub struct MockDbClient {
    connector: MockConnector,
    open: bool,
}

impl MockDbClient {
    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(DbscopeError::database("Connection is closed"))
        }
    }
}

#[async_trait]
impl DbClient for MockDbClient {
    async fn connect(_profile: &ConnectionProfile) -> Result<Self> {
        Ok(Self {
            connector: MockConnector::new(),
            open: true,
        })
    }

    async fn execute(&mut self, options: &QueryOptions) -> Result<Vec<QueryResult>> {
        self.ensure_open()?;
        self.connector.shared.record(format!("execute({})", options.query));
        if let Some(message) = &self.connector.execute_error {
            return Err(DbscopeError::database(message.clone()));
        }

        let results = options
            .query
            .split(';')
            .map(str::trim)
            .filter(|statement| !statement.is_empty())
            .map(|statement| {
                let mut row = Map::new();
                row.insert("statement".to_string(), Value::String(statement.to_string()));
                QueryResult {
                    fields: vec![Field {
                        name: "statement".to_string(),
                    }],
                    rows: vec![row],
                    row_count: 1,
                }
            })
            .collect();
        Ok(results)
    }

    async fn table_meta(&mut self, schema: &str, table: &str) -> Result<Vec<TableMeta>> {
        self.ensure_open()?;
        self.connector.shared.record(format!("table_meta({schema}, {table})"));
        Ok(self
            .connector
            .tables
            .iter()
            .filter(|t| schema.is_empty() || t.table_schema == schema)
            .filter(|t| table.is_empty() || t.table_name == table)
            .cloned()
            .collect())
    }

    async fn routine_meta(&mut self, schema: &str, routine: &str) -> Result<Vec<RoutineMeta>> {
        self.ensure_open()?;
        self.connector
            .shared
            .record(format!("routine_meta({schema}, {routine})"));
        Ok(self
            .connector
            .routines
            .iter()
            .filter(|r| schema.is_empty() || r.routine_schema == schema)
            .filter(|r| routine.is_empty() || r.routine_name == routine)
            .cloned()
            .collect())
    }

    async fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.connector.shared.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
