use std::sync::Mutex;

use querycraft::ast::{
    transform, CamelCaseOptions, CamelCasePlugin, ColumnDefinition, CompiledQuery, CreateTable,
    DataType, Dialect, InsertQuery, Join, OperationNode, OrderItem, PostgresDialect, RuleSet,
    SelectQuery, SqliteDialect, TableReference, Value,
};
use querycraft::db::{Driver, QueryExecutor, Row};
use querycraft::DriverError;

struct FixtureDriver {
    rows: Vec<Row>,
    queries: Mutex<Vec<CompiledQuery>>,
}

impl FixtureDriver {
    fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            queries: Mutex::new(Vec::new()),
        }
    }

    fn last_query(&self) -> CompiledQuery {
        self.queries.lock().unwrap().last().cloned().unwrap()
    }
}

impl Driver for FixtureDriver {
    async fn execute(&self, query: &CompiledQuery) -> Result<Vec<Row>, DriverError> {
        self.queries.lock().unwrap().push(query.clone());
        Ok(self.rows.clone())
    }
}

fn camel_person_self_join() -> OperationNode {
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

fn executor() -> QueryExecutor {
    QueryExecutor::new(Box::new(PostgresDialect)).with_plugin(CamelCasePlugin::new())
}

#[test]
fn self_join_compiles_to_snake_case() {
    let compiled = executor().compile(camel_person_self_join()).unwrap();
    assert_eq!(
        compiled.sql,
        "select \"camel_person\".\"first_name\" from \"camel_person\" \
         inner join \"camel_person\" as \"camel_person2\" \
         on \"camel_person2\".\"id\" = \"camel_person\".\"id\" \
         order by \"first_name\" asc"
    );
    assert!(compiled.bindings.is_empty());
}

#[tokio::test]
async fn result_rows_come_back_camel_cased() {
    let driver = FixtureDriver::new(vec![
        Row::from_pairs([("first_name", Value::from("Jennifer"))]),
        Row::from_pairs([("first_name", Value::from("Arnold"))]),
    ]);

    let rows = executor()
        .execute(camel_person_self_join(), &driver)
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["firstName"]);
    }
    assert_eq!(rows[0].get("firstName"), Some(&Value::from("Jennifer")));
    assert_eq!(rows[1].get("firstName"), Some(&Value::from("Arnold")));
    assert!(driver.last_query().sql.contains("\"camel_person2\""));
}

#[tokio::test]
async fn insert_binds_values_and_maps_returning_rows() {
    let driver = FixtureDriver::new(vec![Row::from_pairs([
        ("id", Value::Int(1)),
        ("first_name", Value::from("Jennifer")),
    ])]);

    let tree: OperationNode = InsertQuery::new(TableReference::new("camelPerson"))
        .columns(["firstName", "lastName"])
        .values(vec![
            OperationNode::value("Jennifer"),
            OperationNode::value("Aniston"),
        ])
        .returning(OperationNode::column("id"))
        .returning(OperationNode::column("firstName"))
        .into();

    let rows = executor().execute(tree, &driver).await.unwrap();

    let sent = driver.last_query();
    assert_eq!(
        sent.sql,
        "insert into \"camel_person\" (\"first_name\", \"last_name\") values ($1, $2) \
         returning \"id\", \"first_name\""
    );
    assert_eq!(
        sent.bindings,
        vec![Value::from("Jennifer"), Value::from("Aniston")]
    );
    assert_eq!(rows[0].get("firstName"), Some(&Value::from("Jennifer")));
}

#[test]
fn create_table_uses_snake_case_names() {
    let tree: OperationNode = CreateTable::new(TableReference::new("camelPerson"))
        .column(ColumnDefinition::new("id", DataType::Integer).autoincrement().primary_key())
        .column(ColumnDefinition::new("firstName", DataType::Varchar(Some(255))))
        .column(ColumnDefinition::new("lastName", DataType::Varchar(Some(255))))
        .into();

    let executor =
        QueryExecutor::new(Box::new(SqliteDialect)).with_plugin(CamelCasePlugin::new());
    let compiled = executor.compile(tree).unwrap();
    assert_eq!(
        compiled.sql,
        "create table \"camel_person\" (\"id\" integer primary key autoincrement, \
         \"first_name\" varchar(255), \"last_name\" varchar(255))"
    );
}

#[test]
fn digit_option_changes_alias_everywhere() {
    let executor = QueryExecutor::new(Box::new(PostgresDialect)).with_plugin(
        CamelCasePlugin::with_options(CamelCaseOptions {
            underscore_before_digits: true,
            ..CamelCaseOptions::default()
        }),
    );
    let compiled = executor.compile(camel_person_self_join()).unwrap();
    assert!(compiled.sql.contains("as \"camel_person_2\""));
    assert!(compiled.sql.contains("on \"camel_person_2\".\"id\""));
}

#[test]
fn empty_ruleset_changes_nothing() {
    let tree = camel_person_self_join();
    let rewritten = transform(tree.clone(), &RuleSet::new()).unwrap();
    assert_eq!(rewritten, tree);
    assert_eq!(
        PostgresDialect.compile(&rewritten).unwrap(),
        PostgresDialect.compile(&tree).unwrap()
    );
}
