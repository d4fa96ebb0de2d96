//! PostgreSQL client on a single sqlx connection.

use crate::config::ConnectionProfile;
use crate::db::{DbClient, Field, QueryOptions, QueryResult, RoutineMeta, TableMeta};
use crate::error::{DbscopeError, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::{Map, Number, Value};
use sqlx::postgres::{PgColumn, PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, Connection, Either, Executor, Row, Statement, TypeInfo};
use tracing::debug;

const TABLE_META_SQL: &str = r#"
WITH key_constraints AS (
    SELECT kcu.table_catalog, kcu.table_schema, kcu.table_name, kcu.column_name,
        tc.constraint_type
    FROM information_schema.key_column_usage kcu
    LEFT JOIN information_schema.table_constraints tc
        ON kcu.table_catalog = tc.table_catalog
        AND kcu.table_schema = tc.table_schema
        AND kcu.table_name = tc.table_name
        AND kcu.constraint_name = tc.constraint_name
)
SELECT t.table_catalog::text, t.table_schema::text, t.table_name::text, t.table_type::text,
    c.column_name::text, c.ordinal_position::int4, c.data_type::text, c.column_default::text,
    c.character_maximum_length::int4, c.numeric_precision::int4,
    c.is_nullable = 'YES' AS is_nullable,
    EXISTS (
        SELECT 1 FROM key_constraints kc
        WHERE kc.table_catalog = c.table_catalog
            AND kc.table_schema = c.table_schema
            AND kc.table_name = c.table_name
            AND kc.column_name = c.column_name
            AND kc.constraint_type = 'PRIMARY KEY'
    ) AS is_pk,
    EXISTS (
        SELECT 1 FROM key_constraints kc
        WHERE kc.table_catalog = c.table_catalog
            AND kc.table_schema = c.table_schema
            AND kc.table_name = c.table_name
            AND kc.column_name = c.column_name
            AND kc.constraint_type = 'FOREIGN KEY'
    ) AS is_fk
FROM information_schema.tables t
JOIN information_schema.columns c
    ON t.table_catalog = c.table_catalog
    AND t.table_schema = c.table_schema
    AND t.table_name = c.table_name
WHERE c.table_schema != 'pg_catalog'
    AND (LENGTH($1::text) = 0 OR c.table_schema::text = $1::text)
    AND (LENGTH($2::text) = 0 OR c.table_name::text = $2::text)
ORDER BY t.table_catalog, t.table_schema, t.table_name, c.ordinal_position
"#;

const ROUTINE_META_SQL: &str = r#"
SELECT r.routine_catalog::text, r.routine_schema::text, r.routine_name::text,
    r.routine_type::text, r.data_type::text AS return_data_type,
    p.parameter_name::text, p.ordinal_position::int4, p.parameter_mode::text,
    p.is_result = 'YES' AS is_result, p.data_type::text,
    p.character_maximum_length::int4, p.parameter_default::text
FROM information_schema.routines r
LEFT JOIN information_schema.parameters p
    ON r.specific_catalog = p.specific_catalog
    AND r.specific_schema = p.specific_schema
    AND r.specific_name = p.specific_name
WHERE r.specific_schema NOT IN ('pg_catalog', 'information_schema')
    AND (LENGTH($1::text) = 0 OR r.routine_schema::text = $1::text)
    AND (LENGTH($2::text) = 0 OR r.routine_name::text = $2::text)
ORDER BY r.routine_catalog, r.routine_schema, r.routine_name, p.ordinal_position
"#;

/// PostgreSQL client holding one connection until [`DbClient::close`].
#[derive(Debug)]
pub struct PostgresClient {
    conn: Option<PgConnection>,
}

impl PostgresClient {
    pub fn from_connection(conn: PgConnection) -> Self {
        Self { conn: Some(conn) }
    }

    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| DbscopeError::database("Connection is closed"))
    }
}

/// Connect options from a profile. Unset fields keep libpq defaults,
/// including the `PG*` environment variables.
pub fn connect_options(profile: &ConnectionProfile) -> PgConnectOptions {
    let mut options = PgConnectOptions::new();
    if let Some(host) = profile.host.as_deref().filter(|h| !h.is_empty()) {
        options = options.host(host);
    }
    if let Some(port) = profile.port {
        options = options.port(port);
    }
    if let Some(username) = profile.username.as_deref().filter(|u| !u.is_empty()) {
        options = options.username(username);
    }
    if let Some(password) = profile.password.as_deref().filter(|p| !p.is_empty()) {
        options = options.password(password);
    }
    if let Some(database) = profile.database.as_deref().filter(|d| !d.is_empty()) {
        options = options.database(database);
    }
    options
}

#[async_trait]
impl DbClient for PostgresClient {
    async fn connect(profile: &ConnectionProfile) -> Result<Self> {
        let options = connect_options(profile);
        debug!(
            "Connecting to {}:{}",
            options.get_host(),
            options.get_port()
        );
        let conn = PgConnection::connect_with(&options).await?;
        Ok(Self::from_connection(conn))
    }

    async fn execute(&mut self, options: &QueryOptions) -> Result<Vec<QueryResult>> {
        let conn = self.conn()?;

        let mut results = Vec::new();
        {
            let mut stream = (&mut *conn).fetch_many(sqlx::raw_sql(&options.query));
            let mut current = QueryResult::default();
            while let Some(step) = stream.try_next().await? {
                match step {
                    Either::Right(row) => {
                        if current.rows.is_empty() {
                            current.fields = fields_of(row.columns());
                        }
                        current.rows.push(convert_row(&row));
                    }
                    Either::Left(done) => {
                        current.row_count = done.rows_affected();
                        results.push(std::mem::take(&mut current));
                    }
                }
            }
        }

        // Rows carry the column list; a lone empty result has to ask the server.
        if let [result] = results.as_mut_slice() {
            if result.rows.is_empty() {
                match (&mut *conn).prepare(&options.query).await {
                    Ok(statement) => result.fields = fields_of(statement.columns()),
                    Err(e) => debug!("No column list for empty result: {}", e),
                }
            }
        }

        debug!("Executed batch producing {} result(s)", results.len());
        Ok(results)
    }

    async fn table_meta(&mut self, schema: &str, table: &str) -> Result<Vec<TableMeta>> {
        let conn = self.conn()?;
        let rows = sqlx::query_as::<_, TableMeta>(TABLE_META_SQL)
            .bind(schema)
            .bind(table)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    async fn routine_meta(&mut self, schema: &str, routine: &str) -> Result<Vec<RoutineMeta>> {
        let conn = self.conn()?;
        let rows = sqlx::query_as::<_, RoutineMeta>(ROUTINE_META_SQL)
            .bind(schema)
            .bind(routine)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
            debug!("Connection closed");
        }
        Ok(())
    }
}

fn fields_of(columns: &[PgColumn]) -> Vec<Field> {
    columns
        .iter()
        .map(|col| Field {
            name: col.name().to_string(),
        })
        .collect()
}

fn convert_row(row: &PgRow) -> Map<String, Value> {
    row.columns()
        .iter()
        .map(|col| {
            let value = convert_value(row, col.ordinal(), col.type_info().name());
            (col.name().to_string(), value)
        })
        .collect()
}

/// Converts one column value to JSON.
///
/// Batches run over the simple query protocol, so values arrive as text;
/// types without a JSON counterpart are returned as their text form.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::from(i64::from(v)))
            .unwrap_or(Value::Null),

        "INT4" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::from(i64::from(v)))
            .unwrap_or(Value::Null),

        "INT8" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),

        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .and_then(|v| Number::from_f64(f64::from(v)))
            .map(Value::Number)
            .unwrap_or(Value::Null),

        "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),

        "JSON" | "JSONB" => row
            .try_get::<Option<Value>, _>(index)
            .ok()
            .flatten()
            .unwrap_or(Value::Null),

        _ => row
            .try_get_unchecked::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}
