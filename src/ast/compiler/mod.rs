/// Operation tree → SQL compiler.
///
/// One traversal ([`QueryCompiler`]) serves every target database. The
/// per-database differences (quoting, placeholders, unsupported clauses and
/// DDL spelling) live behind the [`Dialect`] trait. Text and bindings are
/// produced in the same pass, so the Nth placeholder always refers to the Nth
/// binding.
mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use serde::Deserialize;

use super::types::*;
use super::value::Value;
use crate::error::{QueryError, Result};

/// SQL text plus the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledQuery {
    pub sql: String,
    pub bindings: Vec<Value>,
}

/// Target database flavour.
pub trait Dialect: Send + Sync {
    /// Name used in error messages.
    fn name(&self) -> &'static str;

    fn identifier_quote(&self) -> char;

    /// Placeholder for the binding at 1-based `index`.
    fn placeholder(&self, index: usize) -> String;

    fn supports_returning(&self) -> bool {
        true
    }

    fn supports_offset_without_limit(&self) -> bool {
        true
    }

    /// Column type and constraints for an auto-incrementing integer key.
    fn autoincrement_primary_key(&self) -> &'static str;

    /// Tail of an insert that has no value rows.
    fn default_values(&self) -> &'static str {
        "default values"
    }

    fn data_type(&self, data_type: &DataType) -> String {
        match data_type {
            DataType::Integer => "integer".into(),
            DataType::BigInt => "bigint".into(),
            DataType::Varchar(Some(len)) => format!("varchar({len})"),
            DataType::Varchar(None) => "varchar".into(),
            DataType::Text => "text".into(),
            DataType::Boolean => "boolean".into(),
            DataType::Double => "double precision".into(),
            DataType::Date => "date".into(),
            DataType::Timestamp => "timestamp".into(),
            DataType::Json => "json".into(),
        }
    }

    fn compile(&self, node: &OperationNode) -> Result<CompiledQuery> {
        QueryCompiler::new(self).compile(node)
    }
}

/// Dialect selector used by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[default]
    Postgres,
    Mysql,
    Sqlite,
}

impl DialectKind {
    pub fn dialect(&self) -> Box<dyn Dialect> {
        match self {
            Self::Postgres => Box::new(PostgresDialect),
            Self::Mysql => Box::new(MysqlDialect),
            Self::Sqlite => Box::new(SqliteDialect),
        }
    }
}

/// Single-use SQL writer for one tree.
pub struct QueryCompiler<'d, D: Dialect + ?Sized> {
    dialect: &'d D,
    sql: String,
    bindings: Vec<Value>,
}

impl<'d, D: Dialect + ?Sized> QueryCompiler<'d, D> {
    pub fn new(dialect: &'d D) -> Self {
        Self {
            dialect,
            sql: String::with_capacity(128),
            bindings: Vec::new(),
        }
    }

    pub fn compile(mut self, node: &OperationNode) -> Result<CompiledQuery> {
        match node {
            // A top-level select is the statement itself, not a subquery.
            OperationNode::SelectQuery(select) => self.select(select)?,
            other => self.node(other)?,
        }
        Ok(CompiledQuery {
            sql: self.sql,
            bindings: self.bindings,
        })
    }

    fn unsupported(&self, construct: &str) -> QueryError {
        QueryError::unsupported(self.dialect.name(), construct)
    }

    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    fn node(&mut self, node: &OperationNode) -> Result<()> {
        match node {
            OperationNode::Identifier(id) => self.identifier(id),
            OperationNode::ColumnReference(col) => {
                if let Some(table) = &col.table {
                    self.identifier(table);
                    self.push(".");
                }
                self.identifier(&col.column);
            }
            OperationNode::TableReference(table) => self.table(table),
            OperationNode::AliasedExpression(aliased) => {
                self.node(&aliased.expr)?;
                self.push(" as ");
                self.identifier(&aliased.alias);
            }
            OperationNode::Wildcard(wildcard) => {
                if let Some(table) = &wildcard.table {
                    self.identifier(table);
                    self.push(".");
                }
                self.push("*");
            }
            OperationNode::Join(join) => self.join(join)?,
            OperationNode::OrderItem(item) => self.order_item(item)?,
            OperationNode::BinaryOperation(op) => self.binary(op)?,
            OperationNode::UnaryOperation(op) => self.unary(op)?,
            OperationNode::FunctionCall(call) => {
                self.push(&call.name);
                self.push("(");
                self.list(&call.args)?;
                self.push(")");
            }
            OperationNode::ValueList(list) => {
                self.push("(");
                self.list(&list.items)?;
                self.push(")");
            }
            OperationNode::ColumnUpdate(update) => self.column_update(update)?,
            OperationNode::ColumnDefinition(_) => {
                return Err(self.unsupported("a column definition outside create table"));
            }
            OperationNode::SelectQuery(select) => {
                self.push("(");
                self.select(select)?;
                self.push(")");
            }
            OperationNode::InsertQuery(insert) => self.insert(insert)?,
            OperationNode::UpdateQuery(update) => self.update(update)?,
            OperationNode::DeleteQuery(delete) => self.delete(delete)?,
            OperationNode::CreateTable(create) => self.create_table(create)?,
            OperationNode::DropTable(drop) => {
                self.push("drop table ");
                if drop.if_exists {
                    self.push("if exists ");
                }
                self.table(&drop.table);
            }
            OperationNode::RawFragment(raw) => self.raw(raw)?,
            OperationNode::ValueParameter(param) => self.parameter(&param.value),
        }
        Ok(())
    }

    fn identifier(&mut self, id: &Identifier) {
        if id.raw {
            self.sql.push_str(&id.name);
            return;
        }
        let quote = self.dialect.identifier_quote();
        self.sql.push(quote);
        for ch in id.name.chars() {
            if ch == quote {
                self.sql.push(quote);
            }
            self.sql.push(ch);
        }
        self.sql.push(quote);
    }

    fn table(&mut self, table: &TableReference) {
        if let Some(schema) = &table.schema {
            self.identifier(schema);
            self.push(".");
        }
        self.identifier(&table.name);
        if let Some(alias) = &table.alias {
            self.push(" as ");
            self.identifier(alias);
        }
    }

    fn parameter(&mut self, value: &Value) {
        self.bindings.push(value.clone());
        let placeholder = self.dialect.placeholder(self.bindings.len());
        self.push(&placeholder);
    }

    fn list(&mut self, nodes: &[OperationNode]) -> Result<()> {
        for (i, node) in nodes.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.node(node)?;
        }
        Ok(())
    }

    fn select(&mut self, select: &SelectQuery) -> Result<()> {
        self.push("select ");
        if select.distinct {
            self.push("distinct ");
        }

        if select.selections.is_empty() {
            self.push("*");
        } else {
            self.list(&select.selections)?;
        }

        if !select.from.is_empty() {
            self.push(" from ");
            self.list(&select.from)?;
        }

        for join in &select.joins {
            self.push(" ");
            self.join(join)?;
        }

        self.where_clause(select.where_clause.as_deref())?;

        if !select.group_by.is_empty() {
            self.push(" group by ");
            self.list(&select.group_by)?;
        }

        if let Some(having) = &select.having {
            self.push(" having ");
            self.node(having)?;
        }

        if !select.order_by.is_empty() {
            self.push(" order by ");
            for (i, item) in select.order_by.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.order_item(item)?;
            }
        }

        if let Some(limit) = &select.limit {
            self.push(" limit ");
            self.node(limit)?;
        }

        if let Some(offset) = &select.offset {
            if select.limit.is_none() && !self.dialect.supports_offset_without_limit() {
                return Err(self.unsupported("offset without limit"));
            }
            self.push(" offset ");
            self.node(offset)?;
        }

        Ok(())
    }

    fn join(&mut self, join: &Join) -> Result<()> {
        self.push(join.join_type.as_sql());
        self.push(" ");
        self.node(&join.target)?;
        if let Some(on) = &join.on {
            self.push(" on ");
            self.node(on)?;
        }
        Ok(())
    }

    fn order_item(&mut self, item: &OrderItem) -> Result<()> {
        self.node(&item.expr)?;
        self.push(" ");
        self.push(item.direction.as_sql());
        Ok(())
    }

    fn where_clause(&mut self, predicate: Option<&OperationNode>) -> Result<()> {
        if let Some(predicate) = predicate {
            self.push(" where ");
            self.node(predicate)?;
        }
        Ok(())
    }

    fn returning(&mut self, selections: &[OperationNode]) -> Result<()> {
        if selections.is_empty() {
            return Ok(());
        }
        if !self.dialect.supports_returning() {
            return Err(self.unsupported("returning"));
        }
        self.push(" returning ");
        self.list(selections)
    }

    fn binary(&mut self, op: &BinaryOperation) -> Result<()> {
        let precedence = op.op.precedence();

        // Comparisons do not chain: `(a = b) = c` keeps its parentheses.
        let left_parens = matches!(
            op.left.as_ref(),
            OperationNode::BinaryOperation(child)
                if child.op.precedence() < precedence
                    || (child.op.precedence() == precedence && op.op.is_comparison())
        );
        // Equal precedence on the right only stays bare for the same
        // associative operator: `a - (b - c)` must keep its parentheses.
        let right_parens = matches!(
            op.right.as_ref(),
            OperationNode::BinaryOperation(child)
                if child.op.precedence() < precedence
                    || (child.op.precedence() == precedence
                        && !(child.op == op.op && is_associative(op.op)))
        );

        self.operand(&op.left, left_parens)?;
        self.push(" ");
        self.push(op.op.as_sql());
        self.push(" ");
        self.operand(&op.right, right_parens)
    }

    fn operand(&mut self, node: &OperationNode, parens: bool) -> Result<()> {
        if parens {
            self.push("(");
            self.node(node)?;
            self.push(")");
            Ok(())
        } else {
            self.node(node)
        }
    }

    fn unary(&mut self, op: &UnaryOperation) -> Result<()> {
        let compound = !is_atomic(&op.operand);
        match op.op {
            UnaryOperator::Not => {
                self.push("not ");
                self.operand(&op.operand, compound)
            }
            UnaryOperator::Negate => {
                self.push("-");
                self.operand(&op.operand, compound)
            }
            UnaryOperator::Exists => {
                self.push("exists ");
                self.node(&op.operand)
            }
            UnaryOperator::NotExists => {
                self.push("not exists ");
                self.node(&op.operand)
            }
            UnaryOperator::IsNull => {
                self.operand(&op.operand, compound)?;
                self.push(" is null");
                Ok(())
            }
            UnaryOperator::IsNotNull => {
                self.operand(&op.operand, compound)?;
                self.push(" is not null");
                Ok(())
            }
        }
    }

    fn column_update(&mut self, update: &ColumnUpdate) -> Result<()> {
        self.identifier(&update.column);
        self.push(" = ");
        self.node(&update.value)
    }

    fn raw(&mut self, raw: &RawFragment) -> Result<()> {
        if raw.fragments.len() != raw.bindings.len() + 1 {
            return Err(QueryError::InvalidRawFragment {
                fragments: raw.fragments.len(),
                bindings: raw.bindings.len(),
            });
        }
        for (i, text) in raw.fragments.iter().enumerate() {
            self.push(text);
            if let Some(binding) = raw.bindings.get(i) {
                self.node(binding)?;
            }
        }
        Ok(())
    }

    fn insert(&mut self, insert: &InsertQuery) -> Result<()> {
        self.push("insert into ");
        self.table(&insert.into);

        if !insert.columns.is_empty() {
            self.push(" (");
            for (i, column) in insert.columns.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.identifier(column);
            }
            self.push(")");
        }

        if insert.values.is_empty() {
            self.push(" ");
            self.push(self.dialect.default_values());
        } else {
            self.push(" values ");
            for (i, row) in insert.values.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.push("(");
                self.list(row)?;
                self.push(")");
            }
        }

        self.returning(&insert.returning)
    }

    fn update(&mut self, update: &UpdateQuery) -> Result<()> {
        self.push("update ");
        self.table(&update.table);
        self.push(" set ");
        for (i, assignment) in update.updates.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.column_update(assignment)?;
        }
        self.where_clause(update.where_clause.as_deref())?;
        self.returning(&update.returning)
    }

    fn delete(&mut self, delete: &DeleteQuery) -> Result<()> {
        self.push("delete from ");
        self.table(&delete.from);
        self.where_clause(delete.where_clause.as_deref())?;
        self.returning(&delete.returning)
    }

    fn create_table(&mut self, create: &CreateTable) -> Result<()> {
        self.push("create table ");
        if create.if_not_exists {
            self.push("if not exists ");
        }
        self.table(&create.table);
        self.push(" (");
        for (i, column) in create.columns.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.column_definition(column);
        }
        self.push(")");
        Ok(())
    }

    fn column_definition(&mut self, def: &ColumnDefinition) {
        self.identifier(&def.column);
        self.push(" ");
        if def.autoincrement {
            self.push(self.dialect.autoincrement_primary_key());
        } else {
            let data_type = self.dialect.data_type(&def.data_type);
            self.push(&data_type);
            if def.primary_key {
                self.push(" primary key");
            }
        }
        if def.not_null {
            self.push(" not null");
        }
    }
}

/// Nodes that render as a single token or a self-delimited group, so a
/// prefix or postfix operator can touch them without parentheses.
fn is_atomic(node: &OperationNode) -> bool {
    matches!(
        node,
        OperationNode::Identifier(_)
            | OperationNode::ColumnReference(_)
            | OperationNode::Wildcard(_)
            | OperationNode::FunctionCall(_)
            | OperationNode::ValueList(_)
            | OperationNode::SelectQuery(_)
            | OperationNode::ValueParameter(_)
    )
}

fn is_associative(op: BinaryOperator) -> bool {
    matches!(
        op,
        BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Add | BinaryOperator::Mul
    )
}
