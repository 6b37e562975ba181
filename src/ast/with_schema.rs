use super::plugin::QueryPlugin;
use super::transformer::{transform, RuleSet};
use super::types::{Identifier, NodeKind, OperationNode};
use crate::error::Result;

/// Qualifies every unqualified table reference with a fixed schema.
///
/// Tables that already name a schema are left alone. Result rows pass
/// through unchanged.
pub struct WithSchemaPlugin {
    schema: String,
    rules: RuleSet,
}

impl WithSchemaPlugin {
    pub fn new(schema: impl Into<String>) -> Self {
        let schema = schema.into();
        let rule_schema = schema.clone();
        let rules = RuleSet::new().with_rule(NodeKind::TableReference, move |node| match node {
            OperationNode::TableReference(mut table) => {
                if table.schema.is_none() {
                    table.schema = Some(Identifier::new(rule_schema.as_str()));
                }
                Ok(table.into())
            }
            other => Ok(other),
        });
        Self { schema, rules }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }
}

impl QueryPlugin for WithSchemaPlugin {
    fn name(&self) -> &str {
        "with-schema"
    }

    fn description(&self) -> &str {
        "Adds a default schema to table references"
    }

    fn transform_query(&self, node: OperationNode) -> Result<OperationNode> {
        transform(node, &self.rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DeleteQuery, Join, SelectQuery, TableReference};

    #[test]
    fn test_adds_schema_to_every_table() {
        let tree: OperationNode = SelectQuery::new()
            .select(OperationNode::star())
            .from(TableReference::new("person"))
            .join(Join::inner(
                TableReference::new("pet").with_alias("p"),
                OperationNode::qualified_column("p", "owner_id")
                    .eq(OperationNode::qualified_column("person", "id")),
            ))
            .into();

        let out = WithSchemaPlugin::new("app").transform_query(tree).unwrap();
        let OperationNode::SelectQuery(select) = out else {
            panic!("Expected select query");
        };
        assert_eq!(
            select.from[0],
            OperationNode::TableReference(TableReference::new("person").with_schema("app"))
        );
        assert_eq!(
            *select.joins[0].target,
            OperationNode::TableReference(
                TableReference::new("pet").with_schema("app").with_alias("p")
            )
        );
    }

    #[test]
    fn test_keeps_explicit_schema() {
        let tree: OperationNode =
            DeleteQuery::new(TableReference::new("person").with_schema("audit")).into();
        let out = WithSchemaPlugin::new("app").transform_query(tree).unwrap();
        let OperationNode::DeleteQuery(delete) = out else {
            panic!("Expected delete query");
        };
        assert_eq!(delete.from.schema, Some(Identifier::new("audit")));
    }
}
