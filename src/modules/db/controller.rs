use crate::config::DEFAULT_PROFILE;
use crate::controller::{Arguments, Controller, MetadataStore, handler};
use crate::db::{DbConnector, QueryOptions, QueryResult, RoutineMeta, TableMeta, close_quietly};
use crate::error::{DbscopeError, Result};
use crate::pipe::builtins::{DefaultPipe, IdentityPipe};
use std::sync::Arc;

/// Schema introspection and ad-hoc SQL over a named connection profile.
///
/// Every database call opens its own connection and closes it before
/// returning, whether or not the call succeeded.
pub struct DbController {
    connector: Arc<dyn DbConnector>,
}

impl DbController {
    pub fn new(connector: Arc<dyn DbConnector>) -> Self {
        Self { connector }
    }

    pub async fn get_connection_names(&self) -> Result<Vec<String>> {
        self.connector.profile_names()
    }

    pub async fn get_tables(
        &self,
        schema: String,
        table: String,
        connection: String,
    ) -> Result<Vec<TableMeta>> {
        let mut client = self.connector.open(&connection).await?;
        let result = client.table_meta(&schema, &table).await;
        close_quietly(client).await;
        result
    }

    pub async fn get_routines(
        &self,
        schema: String,
        routine: String,
        connection: String,
    ) -> Result<Vec<RoutineMeta>> {
        let mut client = self.connector.open(&connection).await?;
        let result = client.routine_meta(&schema, &routine).await;
        close_quietly(client).await;
        result
    }

    pub async fn execute(
        &self,
        query: Option<String>,
        connection: String,
    ) -> Result<Vec<QueryResult>> {
        let query = match query {
            Some(query) if !query.trim().is_empty() => query,
            _ => return Err(DbscopeError::validation("No query provided")),
        };

        let mut client = self.connector.open(&connection).await?;
        let result = client.execute(&QueryOptions::new(query)).await;
        close_quietly(client).await;
        result
    }
}

impl Controller for DbController {
    fn describe(meta: &mut MetadataStore<Self>) {
        meta.set_controller_route("db");

        meta.method(
            "get_connection_names",
            handler(|c: Arc<Self>, _args: Arguments| async move {
                c.get_connection_names().await
            }),
        )
        .get("connection");

        meta.method(
            "get_tables",
            handler(|c: Arc<Self>, args: Arguments| async move {
                c.get_tables(args.require(0)?, args.require(1)?, args.require(2)?)
                    .await
            }),
        )
        .get("tables/:schema?.:table?")
        .from_query(0, "schema", DefaultPipe::new(""))
        .from_query(1, "table", DefaultPipe::new(""))
        .from_query(2, "connection", DefaultPipe::new(DEFAULT_PROFILE));

        meta.method(
            "get_routines",
            handler(|c: Arc<Self>, args: Arguments| async move {
                c.get_routines(args.require(0)?, args.require(1)?, args.require(2)?)
                    .await
            }),
        )
        .get("routines/:schema?.:routine?")
        .from_query(0, "schema", DefaultPipe::new(""))
        .from_query(1, "routine", DefaultPipe::new(""))
        .from_query(2, "connection", DefaultPipe::new(DEFAULT_PROFILE));

        meta.method(
            "execute",
            handler(|c: Arc<Self>, args: Arguments| async move {
                c.execute(args.get(0)?, args.require(1)?).await
            }),
        )
        .post("execute")
        .from_body(0, "query", IdentityPipe)
        .from_query(1, "connection", DefaultPipe::new(DEFAULT_PROFILE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockConnector;

    fn controller(connector: &MockConnector) -> DbController {
        DbController::new(Arc::new(connector.clone()))
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected_without_connecting() {
        let connector = MockConnector::new();
        let db = controller(&connector);

        for query in [None, Some(String::new()), Some("  \n\t".to_string())] {
            let err = db.execute(query, "default".to_string()).await.unwrap_err();
            assert_eq!(err.to_string(), "No query provided");
        }
        assert_eq!(connector.opened(), 0);
    }

    #[tokio::test]
    async fn test_connection_closed_after_failing_statement() {
        let connector = MockConnector::new().failing_execute("syntax error at or near \"selec\"");
        let db = controller(&connector);

        let err = db
            .execute(Some("selec 1".to_string()), "default".to_string())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "syntax error at or near \"selec\"");
        assert_eq!(connector.opened(), 1);
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test]
    async fn test_tables_passes_filters() {
        let connector = MockConnector::new();
        let db = controller(&connector);

        db.get_tables("public".to_string(), String::new(), "default".to_string())
            .await
            .unwrap();
        assert_eq!(
            connector.calls(),
            vec!["open(default)".to_string(), "table_meta(public, )".to_string()]
        );
        assert_eq!(connector.closed(), 1);
    }

    #[test]
    fn test_every_method_has_an_explicit_route() {
        let meta = DbController::metadata();
        let names: Vec<_> = meta.methods().iter().map(|m| m.name).collect();
        assert_eq!(
            names,
            vec!["get_connection_names", "get_tables", "get_routines", "execute"]
        );
        for name in names {
            assert!(meta.get_method_verb_and_route(name).is_some(), "{name}");
        }
    }
}
