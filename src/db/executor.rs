use tracing::{debug, warn};

use super::driver::{Driver, Row};
use crate::ast::{
    CamelCasePlugin, CompiledQuery, Dialect, OperationNode, PluginRegistry, QueryPlugin,
    WithSchemaPlugin,
};
use crate::config::QueryConfig;
use crate::error::{QueryError, Result};

/// Runs a tree through plugins, the dialect compiler and a driver.
///
/// Stages are strictly sequential: the first failing stage aborts the call
/// and nothing after it runs.
pub struct QueryExecutor {
    plugins: PluginRegistry,
    dialect: Box<dyn Dialect>,
}

impl QueryExecutor {
    pub fn new(dialect: Box<dyn Dialect>) -> Self {
        Self {
            plugins: PluginRegistry::new(),
            dialect,
        }
    }

    /// Build an executor with the configured dialect and plugins. Naming runs
    /// before schema qualification so the schema name is never rewritten.
    pub fn from_config(config: &QueryConfig) -> Self {
        let mut executor = Self::new(config.dialect.dialect());
        if let Some(options) = &config.camel_case {
            executor.add_plugin(Box::new(CamelCasePlugin::with_options(options.clone())));
        }
        if let Some(schema) = &config.schema {
            executor.add_plugin(Box::new(WithSchemaPlugin::new(schema.as_str())));
        }
        executor
    }

    pub fn with_plugin(mut self, plugin: impl QueryPlugin + 'static) -> Self {
        self.add_plugin(Box::new(plugin));
        self
    }

    pub fn add_plugin(&mut self, plugin: Box<dyn QueryPlugin>) {
        self.plugins.add_plugin(plugin);
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Transform and compile without executing.
    pub fn compile(&self, node: OperationNode) -> Result<CompiledQuery> {
        let kind = node.kind();
        debug!(%kind, plugins = self.plugins.len(), "transforming query");
        let transformed = self.plugins.transform_query(node)?;

        let compiled = self.dialect.compile(&transformed)?;
        debug!(
            dialect = self.dialect.name(),
            sql = %compiled.sql,
            bindings = compiled.bindings.len(),
            "compiled query"
        );
        Ok(compiled)
    }

    pub async fn execute<D: Driver>(&self, node: OperationNode, driver: &D) -> Result<Vec<Row>> {
        let compiled = self.compile(node)?;

        let rows = driver.execute(&compiled).await.map_err(|e| {
            warn!(error = %e, sql = %compiled.sql, "driver execution failed");
            QueryError::Driver(e)
        })?;

        debug!(rows = rows.len(), "mapping result rows");
        self.plugins.transform_result(rows)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::ast::{
        CamelCaseOptions, DialectKind, Join, OrderItem, PostgresDialect, SelectQuery,
        TableReference, Value,
    };
    use crate::error::DriverError;

    /// Returns canned rows and records what it was asked to run.
    struct FixtureDriver {
        rows: Vec<Row>,
        seen: Mutex<Vec<CompiledQuery>>,
    }

    impl FixtureDriver {
        fn new(rows: Vec<Row>) -> Self {
            Self {
                rows,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    impl Driver for FixtureDriver {
        async fn execute(&self, query: &CompiledQuery) -> Result<Vec<Row>, DriverError> {
            self.seen.lock().unwrap().push(query.clone());
            Ok(self.rows.clone())
        }
    }

    struct BrokenDriver;

    impl Driver for BrokenDriver {
        async fn execute(&self, _query: &CompiledQuery) -> Result<Vec<Row>, DriverError> {
            Err(DriverError::msg("connection reset"))
        }
    }

    struct RejectAll;

    impl QueryPlugin for RejectAll {
        fn name(&self) -> &str {
            "reject-all"
        }

        fn transform_query(&self, _node: OperationNode) -> Result<OperationNode> {
            Err(QueryError::Plugin {
                plugin: self.name().to_string(),
                source: anyhow::anyhow!("no queries allowed"),
            })
        }
    }

    fn self_join() -> OperationNode {
        SelectQuery::new()
            .select(OperationNode::qualified_column("camelPerson", "firstName"))
            .from(TableReference::new("camelPerson"))
            .join(Join::inner(
                TableReference::new("camelPerson").with_alias("camelPerson2"),
                OperationNode::qualified_column("camelPerson2", "id")
                    .eq(OperationNode::qualified_column("camelPerson", "id")),
            ))
            .order_by(OrderItem::asc(OperationNode::column("firstName")))
            .into()
    }

    fn two_people() -> Vec<Row> {
        vec![
            Row::from_pairs([("first_name", Value::from("Jennifer"))]),
            Row::from_pairs([("first_name", Value::from("Arnold"))]),
        ]
    }

    #[tokio::test]
    async fn test_camel_case_round_trip() {
        let executor =
            QueryExecutor::new(Box::new(PostgresDialect)).with_plugin(CamelCasePlugin::new());
        let driver = FixtureDriver::new(two_people());

        let rows = executor.execute(self_join(), &driver).await.unwrap();

        let seen = driver.seen.lock().unwrap();
        assert_eq!(
            seen[0].sql,
            "select \"camel_person\".\"first_name\" from \"camel_person\" \
             inner join \"camel_person\" as \"camel_person2\" \
             on \"camel_person2\".\"id\" = \"camel_person\".\"id\" \
             order by \"first_name\" asc"
        );
        assert!(seen[0].bindings.is_empty());

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("firstName"), Some(&Value::from("Jennifer")));
        assert_eq!(rows[1].get("firstName"), Some(&Value::from("Arnold")));
    }

    #[tokio::test]
    async fn test_outbound_failure_skips_driver() {
        let executor = QueryExecutor::new(Box::new(PostgresDialect)).with_plugin(RejectAll);
        let driver = FixtureDriver::new(two_people());

        let err = executor.execute(self_join(), &driver).await.unwrap_err();
        assert!(matches!(err, QueryError::Plugin { .. }));
        assert_eq!(driver.calls(), 0);
    }

    #[tokio::test]
    async fn test_compile_failure_skips_driver() {
        let executor = QueryExecutor::new(DialectKind::Mysql.dialect());
        let driver = FixtureDriver::new(Vec::new());
        let tree: OperationNode = crate::ast::DeleteQuery::new(TableReference::new("person"))
            .returning(OperationNode::column("id"))
            .into();

        let err = executor.execute(tree, &driver).await.unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedOperation { .. }));
        assert_eq!(driver.calls(), 0);
    }

    #[tokio::test]
    async fn test_driver_error_propagates_unchanged() {
        let executor = QueryExecutor::new(Box::new(PostgresDialect));
        let err = executor.execute(self_join(), &BrokenDriver).await.unwrap_err();
        assert!(matches!(err, QueryError::Driver(_)));
        assert_eq!(err.to_string(), "connection reset");
    }

    #[test]
    fn test_from_config_installs_plugins_in_order() {
        let config = QueryConfig {
            dialect: DialectKind::Sqlite,
            schema: Some("app".into()),
            camel_case: Some(CamelCaseOptions::default()),
        };
        let executor = QueryExecutor::from_config(&config);
        let names: Vec<String> = executor
            .plugins()
            .loaded_plugins()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["camel-case", "with-schema"]);
        assert_eq!(executor.dialect().name(), "sqlite");

        let compiled = executor
            .compile(
                SelectQuery::new()
                    .select(OperationNode::column("firstName"))
                    .from(TableReference::new("camelPerson"))
                    .into(),
            )
            .unwrap();
        assert_eq!(
            compiled.sql,
            "select \"first_name\" from \"app\".\"camel_person\""
        );
    }

    #[test]
    fn test_no_plugins_is_plain_compile() {
        let executor = QueryExecutor::new(Box::new(PostgresDialect));
        let direct = PostgresDialect.compile(&self_join()).unwrap();
        assert_eq!(executor.compile(self_join()).unwrap(), direct);
    }
}
