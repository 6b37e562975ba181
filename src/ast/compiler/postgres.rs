use super::Dialect;

/// PostgreSQL: `"ident"`, `$n` placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn identifier_quote(&self) -> char {
        '"'
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn autoincrement_primary_key(&self) -> &'static str {
        "serial primary key"
    }
}
