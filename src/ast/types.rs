//! Operation tree types.
//!
//! This module defines the internal representation that plugins rewrite and
//! dialect compilers serialize. The tree is:
//! - Closed (every consumer matches exhaustively on [`OperationNode`])
//! - Immutable (rewrites build a new tree, nodes are never patched in place)
//! - Strictly owned (children live in `Box`/`Vec`, sharing requires `clone`)

use super::value::Value;

/// Tag identifying each [`OperationNode`] variant. Rule tables are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Identifier,
    ColumnReference,
    TableReference,
    AliasedExpression,
    Wildcard,
    Join,
    OrderItem,
    BinaryOperation,
    UnaryOperation,
    FunctionCall,
    ValueList,
    ColumnUpdate,
    ColumnDefinition,
    SelectQuery,
    InsertQuery,
    UpdateQuery,
    DeleteQuery,
    CreateTable,
    DropTable,
    RawFragment,
    ValueParameter,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identifier => "Identifier",
            Self::ColumnReference => "ColumnReference",
            Self::TableReference => "TableReference",
            Self::AliasedExpression => "AliasedExpression",
            Self::Wildcard => "Wildcard",
            Self::Join => "Join",
            Self::OrderItem => "OrderItem",
            Self::BinaryOperation => "BinaryOperation",
            Self::UnaryOperation => "UnaryOperation",
            Self::FunctionCall => "FunctionCall",
            Self::ValueList => "ValueList",
            Self::ColumnUpdate => "ColumnUpdate",
            Self::ColumnDefinition => "ColumnDefinition",
            Self::SelectQuery => "SelectQuery",
            Self::InsertQuery => "InsertQuery",
            Self::UpdateQuery => "UpdateQuery",
            Self::DeleteQuery => "DeleteQuery",
            Self::CreateTable => "CreateTable",
            Self::DropTable => "DropTable",
            Self::RawFragment => "RawFragment",
            Self::ValueParameter => "ValueParameter",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A table, column or alias name.
///
/// Non-raw identifiers are quoted by the dialect compiler. Raw identifiers
/// are emitted verbatim and are left alone by naming plugins.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub name: String,
    pub raw: bool,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw: false,
        }
    }

    pub fn raw(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw: true,
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// `table.column` or just `column`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnReference {
    pub table: Option<Identifier>,
    pub column: Identifier,
}

/// `schema.table as alias`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableReference {
    pub schema: Option<Identifier>,
    pub name: Identifier,
    pub alias: Option<Identifier>,
}

impl TableReference {
    pub fn new(name: impl Into<Identifier>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            alias: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<Identifier>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<Identifier>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// `expr as alias`, used for selections and derived tables.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasedExpression {
    pub expr: Box<OperationNode>,
    pub alias: Identifier,
}

/// `*` or `table.*`.
#[derive(Debug, Clone, PartialEq)]
pub struct Wildcard {
    pub table: Option<Identifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Inner => "inner join",
            Self::Left => "left join",
            Self::Right => "right join",
            Self::Full => "full join",
            Self::Cross => "cross join",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub target: Box<OperationNode>,
    pub on: Option<Box<OperationNode>>,
}

impl Join {
    pub fn new(
        join_type: JoinType,
        target: impl Into<OperationNode>,
        on: Option<OperationNode>,
    ) -> Self {
        Self {
            join_type,
            target: Box::new(target.into()),
            on: on.map(Box::new),
        }
    }

    pub fn inner(target: impl Into<OperationNode>, on: OperationNode) -> Self {
        Self::new(JoinType::Inner, target, Some(on))
    }

    pub fn left(target: impl Into<OperationNode>, on: OperationNode) -> Self {
        Self::new(JoinType::Left, target, Some(on))
    }

    pub fn cross(target: impl Into<OperationNode>) -> Self {
        Self::new(JoinType::Cross, target, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Box<OperationNode>,
    pub direction: OrderDirection,
}

impl OrderItem {
    pub fn asc(expr: impl Into<OperationNode>) -> Self {
        Self {
            expr: Box::new(expr.into()),
            direction: OrderDirection::Asc,
        }
    }

    pub fn desc(expr: impl Into<OperationNode>) -> Self {
        Self {
            expr: Box::new(expr.into()),
            direction: OrderDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    NotLike,
    In,
    NotIn,
    // Logical
    And,
    Or,
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOperator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Like => "like",
            Self::NotLike => "not like",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::And => "and",
            Self::Or => "or",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }

    /// Comparison operators are non-associative in SQL.
    pub fn is_comparison(&self) -> bool {
        self.precedence() == 3
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq
            | Self::NotEq
            | Self::Lt
            | Self::LtEq
            | Self::Gt
            | Self::GtEq
            | Self::Like
            | Self::NotLike
            | Self::In
            | Self::NotIn => 3,
            Self::Add | Self::Sub => 4,
            Self::Mul | Self::Div | Self::Mod => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryOperation {
    pub left: Box<OperationNode>,
    pub op: BinaryOperator,
    pub right: Box<OperationNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
    Exists,
    NotExists,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryOperation {
    pub op: UnaryOperator,
    pub operand: Box<OperationNode>,
}

/// `name(args)`. The function name is SQL text, not an identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<OperationNode>,
}

/// Parenthesized list, e.g. the right side of `in`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueList {
    pub items: Vec<OperationNode>,
}

/// `column = value` inside an update's `set` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnUpdate {
    pub column: Identifier,
    pub value: Box<OperationNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Integer,
    BigInt,
    Varchar(Option<u32>),
    Text,
    Boolean,
    Double,
    Date,
    Timestamp,
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub column: Identifier,
    pub data_type: DataType,
    pub primary_key: bool,
    pub autoincrement: bool,
    pub not_null: bool,
}

impl ColumnDefinition {
    pub fn new(column: impl Into<Identifier>, data_type: DataType) -> Self {
        Self {
            column: column.into(),
            data_type,
            primary_key: false,
            autoincrement: false,
            not_null: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Auto-incrementing integer key (`increments()` in builder terms).
    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }
}

/// A SELECT query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectQuery {
    pub distinct: bool,
    pub selections: Vec<OperationNode>,
    pub from: Vec<OperationNode>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Box<OperationNode>>,
    pub group_by: Vec<OperationNode>,
    pub having: Option<Box<OperationNode>>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<Box<OperationNode>>,
    pub offset: Option<Box<OperationNode>>,
}

impl SelectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn select(mut self, selection: impl Into<OperationNode>) -> Self {
        self.selections.push(selection.into());
        self
    }

    pub fn from(mut self, source: impl Into<OperationNode>) -> Self {
        self.from.push(source.into());
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Adds a predicate, `and`-ing it with any existing one.
    pub fn filter(mut self, predicate: OperationNode) -> Self {
        self.where_clause = Some(Box::new(and_with(self.where_clause.take(), predicate)));
        self
    }

    pub fn group_by(mut self, expr: impl Into<OperationNode>) -> Self {
        self.group_by.push(expr.into());
        self
    }

    pub fn having(mut self, predicate: OperationNode) -> Self {
        self.having = Some(Box::new(and_with(self.having.take(), predicate)));
        self
    }

    pub fn order_by(mut self, item: OrderItem) -> Self {
        self.order_by.push(item);
        self
    }

    pub fn limit(mut self, limit: impl Into<OperationNode>) -> Self {
        self.limit = Some(Box::new(limit.into()));
        self
    }

    pub fn offset(mut self, offset: impl Into<OperationNode>) -> Self {
        self.offset = Some(Box::new(offset.into()));
        self
    }
}

/// An INSERT query; each entry of `values` is one row.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertQuery {
    pub into: TableReference,
    pub columns: Vec<Identifier>,
    pub values: Vec<Vec<OperationNode>>,
    pub returning: Vec<OperationNode>,
}

impl InsertQuery {
    pub fn new(into: TableReference) -> Self {
        Self {
            into,
            columns: Vec::new(),
            values: Vec::new(),
            returning: Vec::new(),
        }
    }

    pub fn columns<I, T>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Identifier>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn values(mut self, row: Vec<OperationNode>) -> Self {
        self.values.push(row);
        self
    }

    pub fn returning(mut self, selection: impl Into<OperationNode>) -> Self {
        self.returning.push(selection.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateQuery {
    pub table: TableReference,
    pub updates: Vec<ColumnUpdate>,
    pub where_clause: Option<Box<OperationNode>>,
    pub returning: Vec<OperationNode>,
}

impl UpdateQuery {
    pub fn new(table: TableReference) -> Self {
        Self {
            table,
            updates: Vec::new(),
            where_clause: None,
            returning: Vec::new(),
        }
    }

    pub fn set(mut self, column: impl Into<Identifier>, value: impl Into<OperationNode>) -> Self {
        self.updates.push(ColumnUpdate {
            column: column.into(),
            value: Box::new(value.into()),
        });
        self
    }

    pub fn filter(mut self, predicate: OperationNode) -> Self {
        self.where_clause = Some(Box::new(and_with(self.where_clause.take(), predicate)));
        self
    }

    pub fn returning(mut self, selection: impl Into<OperationNode>) -> Self {
        self.returning.push(selection.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteQuery {
    pub from: TableReference,
    pub where_clause: Option<Box<OperationNode>>,
    pub returning: Vec<OperationNode>,
}

impl DeleteQuery {
    pub fn new(from: TableReference) -> Self {
        Self {
            from,
            where_clause: None,
            returning: Vec::new(),
        }
    }

    pub fn filter(mut self, predicate: OperationNode) -> Self {
        self.where_clause = Some(Box::new(and_with(self.where_clause.take(), predicate)));
        self
    }

    pub fn returning(mut self, selection: impl Into<OperationNode>) -> Self {
        self.returning.push(selection.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub table: TableReference,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDefinition>,
}

impl CreateTable {
    pub fn new(table: TableReference) -> Self {
        Self {
            table,
            if_not_exists: false,
            columns: Vec::new(),
        }
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTable {
    pub table: TableReference,
    pub if_exists: bool,
}

impl DropTable {
    pub fn new(table: TableReference) -> Self {
        Self {
            table,
            if_exists: false,
        }
    }

    pub fn if_exists(mut self) -> Self {
        self.if_exists = true;
        self
    }
}

/// Verbatim SQL text with embedded bindings.
///
/// Rendered as `fragments[0] bindings[0] fragments[1] ... fragments[n]`, so a
/// well-formed fragment has exactly one more text piece than bindings. The
/// text is opaque to plugins; the bindings are ordinary nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFragment {
    pub fragments: Vec<String>,
    pub bindings: Vec<OperationNode>,
}

impl RawFragment {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            fragments: vec![sql.into()],
            bindings: Vec::new(),
        }
    }

    pub fn with_bindings<I, S>(fragments: I, bindings: Vec<OperationNode>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            bindings,
        }
    }
}

/// Placeholder carrying the value to bind at its position.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueParameter {
    pub value: Value,
}

/// A node of the operation tree.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationNode {
    Identifier(Identifier),
    ColumnReference(ColumnReference),
    TableReference(TableReference),
    AliasedExpression(AliasedExpression),
    Wildcard(Wildcard),
    Join(Join),
    OrderItem(OrderItem),
    BinaryOperation(BinaryOperation),
    UnaryOperation(UnaryOperation),
    FunctionCall(FunctionCall),
    ValueList(ValueList),
    ColumnUpdate(ColumnUpdate),
    ColumnDefinition(ColumnDefinition),
    SelectQuery(Box<SelectQuery>),
    InsertQuery(Box<InsertQuery>),
    UpdateQuery(Box<UpdateQuery>),
    DeleteQuery(Box<DeleteQuery>),
    CreateTable(Box<CreateTable>),
    DropTable(DropTable),
    RawFragment(RawFragment),
    ValueParameter(ValueParameter),
}

impl OperationNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Identifier(_) => NodeKind::Identifier,
            Self::ColumnReference(_) => NodeKind::ColumnReference,
            Self::TableReference(_) => NodeKind::TableReference,
            Self::AliasedExpression(_) => NodeKind::AliasedExpression,
            Self::Wildcard(_) => NodeKind::Wildcard,
            Self::Join(_) => NodeKind::Join,
            Self::OrderItem(_) => NodeKind::OrderItem,
            Self::BinaryOperation(_) => NodeKind::BinaryOperation,
            Self::UnaryOperation(_) => NodeKind::UnaryOperation,
            Self::FunctionCall(_) => NodeKind::FunctionCall,
            Self::ValueList(_) => NodeKind::ValueList,
            Self::ColumnUpdate(_) => NodeKind::ColumnUpdate,
            Self::ColumnDefinition(_) => NodeKind::ColumnDefinition,
            Self::SelectQuery(_) => NodeKind::SelectQuery,
            Self::InsertQuery(_) => NodeKind::InsertQuery,
            Self::UpdateQuery(_) => NodeKind::UpdateQuery,
            Self::DeleteQuery(_) => NodeKind::DeleteQuery,
            Self::CreateTable(_) => NodeKind::CreateTable,
            Self::DropTable(_) => NodeKind::DropTable,
            Self::RawFragment(_) => NodeKind::RawFragment,
            Self::ValueParameter(_) => NodeKind::ValueParameter,
        }
    }

    // Convenience constructors

    pub fn identifier(name: impl Into<Identifier>) -> Self {
        Self::Identifier(name.into())
    }

    pub fn column(name: impl Into<Identifier>) -> Self {
        Self::ColumnReference(ColumnReference {
            table: None,
            column: name.into(),
        })
    }

    pub fn qualified_column(table: impl Into<Identifier>, column: impl Into<Identifier>) -> Self {
        Self::ColumnReference(ColumnReference {
            table: Some(table.into()),
            column: column.into(),
        })
    }

    pub fn table(name: impl Into<Identifier>) -> Self {
        Self::TableReference(TableReference::new(name))
    }

    /// `*`
    pub fn star() -> Self {
        Self::Wildcard(Wildcard { table: None })
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Self::ValueParameter(ValueParameter {
            value: value.into(),
        })
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Self::RawFragment(RawFragment::new(sql))
    }

    pub fn function(name: impl Into<String>, args: Vec<OperationNode>) -> Self {
        Self::FunctionCall(FunctionCall {
            name: name.into(),
            args,
        })
    }

    pub fn list(items: Vec<OperationNode>) -> Self {
        Self::ValueList(ValueList { items })
    }

    pub fn binary(left: OperationNode, op: BinaryOperator, right: OperationNode) -> Self {
        Self::BinaryOperation(BinaryOperation {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    pub fn unary(op: UnaryOperator, operand: OperationNode) -> Self {
        Self::UnaryOperation(UnaryOperation {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn aliased(self, alias: impl Into<Identifier>) -> Self {
        Self::AliasedExpression(AliasedExpression {
            expr: Box::new(self),
            alias: alias.into(),
        })
    }

    pub fn eq(self, other: OperationNode) -> Self {
        Self::binary(self, BinaryOperator::Eq, other)
    }

    pub fn and(self, other: OperationNode) -> Self {
        Self::binary(self, BinaryOperator::And, other)
    }

    pub fn or(self, other: OperationNode) -> Self {
        Self::binary(self, BinaryOperator::Or, other)
    }
}

fn and_with(existing: Option<Box<OperationNode>>, predicate: OperationNode) -> OperationNode {
    match existing {
        Some(current) => current.and(predicate),
        None => predicate,
    }
}

macro_rules! node_variants {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for OperationNode {
                fn from(node: $variant) -> Self {
                    OperationNode::$variant(node)
                }
            }

            impl TryFrom<OperationNode> for $variant {
                type Error = OperationNode;

                fn try_from(node: OperationNode) -> Result<Self, Self::Error> {
                    match node {
                        OperationNode::$variant(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

node_variants!(
    Identifier,
    ColumnReference,
    TableReference,
    AliasedExpression,
    Wildcard,
    Join,
    OrderItem,
    BinaryOperation,
    UnaryOperation,
    FunctionCall,
    ValueList,
    ColumnUpdate,
    ColumnDefinition,
    DropTable,
    RawFragment,
    ValueParameter,
);

macro_rules! boxed_node_variants {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for OperationNode {
                fn from(node: $variant) -> Self {
                    OperationNode::$variant(Box::new(node))
                }
            }
        )*
    };
}

boxed_node_variants!(SelectQuery, InsertQuery, UpdateQuery, DeleteQuery, CreateTable);
