/// Generic operation-tree rewriting.
///
/// A [`RuleSet`] maps a [`NodeKind`] to a rewrite function. The
/// [`NodeTransformer`] walks the whole tree post-order (children first,
/// depth-first, left-to-right in field order), rebuilds each node from its
/// transformed children and then hands it to the rule registered for its
/// kind. Kinds without a rule are rebuilt unchanged.
///
/// # Example
///
/// ```ignore
/// let rules = RuleSet::new().with_rule(NodeKind::Identifier, |node| match node {
///     OperationNode::Identifier(id) => Ok(Identifier::new(id.name.to_lowercase()).into()),
///     other => Ok(other),
/// });
/// let lowered = transform(tree, &rules)?;
/// ```
use std::collections::HashMap;

use tracing::trace;

use super::types::*;
use crate::error::{QueryError, Result};

/// Signature of a single rewrite rule.
pub type RewriteFn = dyn Fn(OperationNode) -> anyhow::Result<OperationNode> + Send + Sync;

/// Rewrite rules keyed by node kind.
#[derive(Default)]
pub struct RuleSet {
    rules: HashMap<NodeKind, Box<RewriteFn>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule<F>(mut self, kind: NodeKind, rule: F) -> Self
    where
        F: Fn(OperationNode) -> anyhow::Result<OperationNode> + Send + Sync + 'static,
    {
        self.register(kind, rule);
        self
    }

    /// Register a rule, replacing any previous rule for the same kind.
    pub fn register<F>(&mut self, kind: NodeKind, rule: F)
    where
        F: Fn(OperationNode) -> anyhow::Result<OperationNode> + Send + Sync + 'static,
    {
        self.rules.insert(kind, Box::new(rule));
    }

    pub fn get(&self, kind: NodeKind) -> Option<&RewriteFn> {
        self.rules.get(&kind).map(|rule| rule.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Kinds with a registered rule, in declaration order.
    pub fn kinds(&self) -> Vec<NodeKind> {
        let mut kinds: Vec<NodeKind> = self.rules.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Rewrite `node` with `rules`.
pub fn transform(node: OperationNode, rules: &RuleSet) -> Result<OperationNode> {
    NodeTransformer::new(rules).transform(node)
}

/// Post-order tree rewriter driven by a [`RuleSet`].
pub struct NodeTransformer<'r> {
    rules: &'r RuleSet,
}

impl<'r> NodeTransformer<'r> {
    pub fn new(rules: &'r RuleSet) -> Self {
        Self { rules }
    }

    pub fn transform(&self, node: OperationNode) -> Result<OperationNode> {
        let rebuilt = self.transform_children(node)?;
        self.apply(rebuilt)
    }

    fn apply(&self, node: OperationNode) -> Result<OperationNode> {
        let kind = node.kind();
        match self.rules.get(kind) {
            Some(rule) => {
                trace!(%kind, "applying rewrite rule");
                rule(node).map_err(|source| QueryError::Rule { kind, source })
            }
            None => Ok(node),
        }
    }

    fn transform_children(&self, node: OperationNode) -> Result<OperationNode> {
        let node = match node {
            OperationNode::Identifier(id) => OperationNode::Identifier(id),
            OperationNode::ColumnReference(col) => OperationNode::ColumnReference(ColumnReference {
                table: self.transform_opt_typed(col.table, "column qualifier")?,
                column: self.transform_typed(col.column, "column name")?,
            }),
            OperationNode::TableReference(table) => {
                OperationNode::TableReference(self.table_children(table)?)
            }
            OperationNode::AliasedExpression(aliased) => {
                OperationNode::AliasedExpression(AliasedExpression {
                    expr: self.transform_boxed(aliased.expr)?,
                    alias: self.transform_typed(aliased.alias, "alias")?,
                })
            }
            OperationNode::Wildcard(wildcard) => OperationNode::Wildcard(Wildcard {
                table: self.transform_opt_typed(wildcard.table, "wildcard qualifier")?,
            }),
            OperationNode::Join(join) => OperationNode::Join(Join {
                join_type: join.join_type,
                target: self.transform_boxed(join.target)?,
                on: self.transform_opt_boxed(join.on)?,
            }),
            OperationNode::OrderItem(item) => OperationNode::OrderItem(OrderItem {
                expr: self.transform_boxed(item.expr)?,
                direction: item.direction,
            }),
            OperationNode::BinaryOperation(op) => OperationNode::BinaryOperation(BinaryOperation {
                left: self.transform_boxed(op.left)?,
                op: op.op,
                right: self.transform_boxed(op.right)?,
            }),
            OperationNode::UnaryOperation(op) => OperationNode::UnaryOperation(UnaryOperation {
                op: op.op,
                operand: self.transform_boxed(op.operand)?,
            }),
            OperationNode::FunctionCall(call) => OperationNode::FunctionCall(FunctionCall {
                name: call.name,
                args: self.transform_list(call.args)?,
            }),
            OperationNode::ValueList(list) => OperationNode::ValueList(ValueList {
                items: self.transform_list(list.items)?,
            }),
            OperationNode::ColumnUpdate(update) => OperationNode::ColumnUpdate(ColumnUpdate {
                column: self.transform_typed(update.column, "update column")?,
                value: self.transform_boxed(update.value)?,
            }),
            OperationNode::ColumnDefinition(def) => {
                OperationNode::ColumnDefinition(ColumnDefinition {
                    column: self.transform_typed(def.column, "column definition")?,
                    ..def
                })
            }
            OperationNode::SelectQuery(select) => {
                OperationNode::SelectQuery(Box::new(self.select_children(*select)?))
            }
            OperationNode::InsertQuery(insert) => {
                let insert = *insert;
                OperationNode::InsertQuery(Box::new(InsertQuery {
                    into: self.transform_typed(insert.into, "insert target")?,
                    columns: self.transform_typed_list(insert.columns, "insert column")?,
                    values: insert
                        .values
                        .into_iter()
                        .map(|row| self.transform_list(row))
                        .collect::<Result<Vec<_>>>()?,
                    returning: self.transform_list(insert.returning)?,
                }))
            }
            OperationNode::UpdateQuery(update) => {
                let update = *update;
                OperationNode::UpdateQuery(Box::new(UpdateQuery {
                    table: self.transform_typed(update.table, "update target")?,
                    updates: self.transform_typed_list(update.updates, "update list")?,
                    where_clause: self.transform_opt_boxed(update.where_clause)?,
                    returning: self.transform_list(update.returning)?,
                }))
            }
            OperationNode::DeleteQuery(delete) => {
                let delete = *delete;
                OperationNode::DeleteQuery(Box::new(DeleteQuery {
                    from: self.transform_typed(delete.from, "delete target")?,
                    where_clause: self.transform_opt_boxed(delete.where_clause)?,
                    returning: self.transform_list(delete.returning)?,
                }))
            }
            OperationNode::CreateTable(create) => {
                let create = *create;
                OperationNode::CreateTable(Box::new(CreateTable {
                    table: self.transform_typed(create.table, "create table target")?,
                    if_not_exists: create.if_not_exists,
                    columns: self.transform_typed_list(create.columns, "column definitions")?,
                }))
            }
            OperationNode::DropTable(drop) => OperationNode::DropTable(DropTable {
                table: self.transform_typed(drop.table, "drop table target")?,
                if_exists: drop.if_exists,
            }),
            // Text pieces are opaque; only the embedded bindings are nodes.
            OperationNode::RawFragment(raw) => OperationNode::RawFragment(RawFragment {
                fragments: raw.fragments,
                bindings: self.transform_list(raw.bindings)?,
            }),
            OperationNode::ValueParameter(param) => OperationNode::ValueParameter(param),
        };
        Ok(node)
    }

    fn table_children(&self, table: TableReference) -> Result<TableReference> {
        Ok(TableReference {
            schema: self.transform_opt_typed(table.schema, "table schema")?,
            name: self.transform_typed(table.name, "table name")?,
            alias: self.transform_opt_typed(table.alias, "table alias")?,
        })
    }

    fn select_children(&self, select: SelectQuery) -> Result<SelectQuery> {
        Ok(SelectQuery {
            distinct: select.distinct,
            selections: self.transform_list(select.selections)?,
            from: self.transform_list(select.from)?,
            joins: self.transform_typed_list(select.joins, "join list")?,
            where_clause: self.transform_opt_boxed(select.where_clause)?,
            group_by: self.transform_list(select.group_by)?,
            having: self.transform_opt_boxed(select.having)?,
            order_by: self.transform_typed_list(select.order_by, "order by list")?,
            limit: self.transform_opt_boxed(select.limit)?,
            offset: self.transform_opt_boxed(select.offset)?,
        })
    }

    /// Transform a child stored as a concrete node type. The rule output must
    /// still be that type.
    fn transform_typed<T>(&self, node: T, position: &'static str) -> Result<T>
    where
        T: Into<OperationNode> + TryFrom<OperationNode, Error = OperationNode>,
    {
        T::try_from(self.transform(node.into())?).map_err(|other| {
            QueryError::UnsupportedNodeKind {
                kind: other.kind(),
                position,
            }
        })
    }

    fn transform_opt_typed<T>(&self, node: Option<T>, position: &'static str) -> Result<Option<T>>
    where
        T: Into<OperationNode> + TryFrom<OperationNode, Error = OperationNode>,
    {
        node.map(|n| self.transform_typed(n, position)).transpose()
    }

    fn transform_typed_list<T>(&self, nodes: Vec<T>, position: &'static str) -> Result<Vec<T>>
    where
        T: Into<OperationNode> + TryFrom<OperationNode, Error = OperationNode>,
    {
        nodes
            .into_iter()
            .map(|n| self.transform_typed(n, position))
            .collect()
    }

    fn transform_boxed(&self, node: Box<OperationNode>) -> Result<Box<OperationNode>> {
        self.transform(*node).map(Box::new)
    }

    fn transform_opt_boxed(
        &self,
        node: Option<Box<OperationNode>>,
    ) -> Result<Option<Box<OperationNode>>> {
        node.map(|n| self.transform_boxed(n)).transpose()
    }

    fn transform_list(&self, nodes: Vec<OperationNode>) -> Result<Vec<OperationNode>> {
        nodes.into_iter().map(|n| self.transform(n)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

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

    /// Touches every identifier-bearing position the model has.
    fn kitchen_sink() -> Vec<OperationNode> {
        let sub = SelectQuery::new()
            .select(OperationNode::column("personId"))
            .from(TableReference::new("petOwner"));
        let select: OperationNode = SelectQuery::new()
            .select(OperationNode::column("firstName").aliased("givenName"))
            .select(OperationNode::Wildcard(Wildcard {
                table: Some("petOwner".into()),
            }))
            .from(OperationNode::from(sub.clone()).aliased("ownerSub"))
            .join(Join::left(
                TableReference::new("camelPet").with_schema("zooSchema"),
                OperationNode::qualified_column("camelPet", "ownerId")
                    .eq(OperationNode::qualified_column("ownerSub", "personId")),
            ))
            .filter(OperationNode::binary(
                OperationNode::column("personId"),
                BinaryOperator::In,
                sub.into(),
            ))
            .filter(OperationNode::RawFragment(RawFragment::with_bindings(
                ["", " is not null"],
                vec![OperationNode::column("lastName")],
            )))
            .group_by(OperationNode::column("familyName"))
            .having(OperationNode::function(
                "count",
                vec![OperationNode::column("petId")],
            ))
            .order_by(OrderItem::desc(OperationNode::column("birthDate")))
            .into();
        let insert = InsertQuery::new(TableReference::new("camelPerson"))
            .columns(["firstName", "lastName"])
            .values(vec![OperationNode::value("A"), OperationNode::value("B")])
            .returning(OperationNode::column("personId"))
            .into();
        let update = UpdateQuery::new(TableReference::new("camelPerson"))
            .set("lastName", OperationNode::value("C"))
            .filter(OperationNode::column("personId").eq(OperationNode::value(1)))
            .into();
        let delete = DeleteQuery::new(TableReference::new("camelPerson"))
            .filter(OperationNode::unary(
                UnaryOperator::IsNull,
                OperationNode::column("firstName"),
            ))
            .into();
        let create = CreateTable::new(TableReference::new("camelPerson"))
            .column(ColumnDefinition::new("personId", DataType::Integer).primary_key())
            .into();
        let drop = DropTable::new(TableReference::new("camelPerson")).into();
        vec![select, insert, update, delete, create, drop]
    }

    fn recording_rules(seen: Arc<Mutex<Vec<String>>>) -> RuleSet {
        RuleSet::new().with_rule(NodeKind::Identifier, move |node| {
            if let OperationNode::Identifier(id) = &node {
                seen.lock().unwrap().push(id.name.clone());
            }
            Ok(node)
        })
    }

    fn upper_rules() -> RuleSet {
        RuleSet::new().with_rule(NodeKind::Identifier, |node| match node {
            OperationNode::Identifier(id) => Ok(Identifier::new(id.name.to_uppercase()).into()),
            other => Ok(other),
        })
    }

    #[test]
    fn test_empty_ruleset_is_identity() {
        let rules = RuleSet::new();
        assert!(rules.is_empty());
        for tree in kitchen_sink() {
            assert_eq!(transform(tree.clone(), &rules).unwrap(), tree);
        }
    }

    #[test]
    fn test_visits_every_identifier() {
        for tree in kitchen_sink() {
            let rewritten = transform(tree, &upper_rules()).unwrap();

            let seen = Arc::new(Mutex::new(Vec::new()));
            transform(rewritten, &recording_rules(seen.clone())).unwrap();
            let seen = seen.lock().unwrap();
            assert!(!seen.is_empty());
            for name in seen.iter() {
                assert_eq!(name, &name.to_uppercase(), "missed identifier {name}");
            }
        }
    }

    #[test]
    fn test_reaches_subselects_and_raw_bindings() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let select = kitchen_sink().remove(0);
        transform(select, &recording_rules(seen.clone())).unwrap();
        let seen = seen.lock().unwrap();
        // the `in (select ...)` sub-select and the derived table both mention petOwner
        assert_eq!(seen.iter().filter(|n| *n == "petOwner").count(), 3);
        assert!(seen.contains(&"lastName".to_string()));
        assert!(seen.contains(&"zooSchema".to_string()));
    }

    #[test]
    fn test_post_order_left_to_right() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        transform(self_join(), &recording_rules(seen.clone())).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "camelPerson",
                "firstName",
                "camelPerson",
                "camelPerson",
                "camelPerson2",
                "camelPerson2",
                "id",
                "camelPerson",
                "id",
                "firstName",
            ]
        );
    }

    #[test]
    fn test_composite_rule_sees_rewritten_children() {
        let rules = upper_rules().with_rule(NodeKind::Join, |node| {
            if let OperationNode::Join(join) = &node {
                if let OperationNode::TableReference(table) = join.target.as_ref() {
                    anyhow::ensure!(
                        table.alias.as_ref().map(Identifier::as_str) == Some("CAMELPERSON2"),
                        "join alias was not rewritten before the join rule ran"
                    );
                }
            }
            Ok(node)
        });
        assert!(transform(self_join(), &rules).is_ok());
    }

    #[test]
    fn test_raw_fragment_text_untouched() {
        let raw = OperationNode::RawFragment(RawFragment::with_bindings(
            ["lower(", ") = 'firstName'"],
            vec![OperationNode::column("firstName")],
        ));
        match transform(raw, &upper_rules()).unwrap() {
            OperationNode::RawFragment(raw) => {
                assert_eq!(raw.fragments, vec!["lower(", ") = 'firstName'"]);
                assert_eq!(raw.bindings, vec![OperationNode::column("FIRSTNAME")]);
            }
            other => panic!("Expected RawFragment, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_kind_in_typed_slot() {
        let rules = RuleSet::new().with_rule(NodeKind::Identifier, |_| Ok(OperationNode::value(1)));
        let err = transform(OperationNode::column("id"), &rules).unwrap_err();
        match err {
            QueryError::UnsupportedNodeKind { kind, position } => {
                assert_eq!(kind, NodeKind::ValueParameter);
                assert_eq!(position, "column name");
            }
            other => panic!("Expected UnsupportedNodeKind, got {:?}", other),
        }
    }

    #[test]
    fn test_rule_error_is_reported_with_kind() {
        let rules = RuleSet::new().with_rule(NodeKind::ValueParameter, |_| {
            anyhow::bail!("values are not allowed here")
        });
        let tree = OperationNode::column("id").eq(OperationNode::value(1));
        match transform(tree, &rules).unwrap_err() {
            QueryError::Rule { kind, source } => {
                assert_eq!(kind, NodeKind::ValueParameter);
                assert_eq!(source.to_string(), "values are not allowed here");
            }
            other => panic!("Expected Rule error, got {:?}", other),
        }
    }

    #[test]
    fn test_rule_replaces_previous_registration() {
        let mut rules = upper_rules();
        rules.register(NodeKind::Identifier, Ok);
        assert_eq!(rules.kinds(), vec![NodeKind::Identifier]);
        let tree = OperationNode::column("id");
        assert_eq!(transform(tree.clone(), &rules).unwrap(), tree);
    }
}
