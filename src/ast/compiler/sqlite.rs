use super::Dialect;
use crate::ast::DataType;

/// SQLite: `"ident"`, `?` placeholders, offset needs a limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn identifier_quote(&self) -> char {
        '"'
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn supports_offset_without_limit(&self) -> bool {
        false
    }

    fn autoincrement_primary_key(&self) -> &'static str {
        "integer primary key autoincrement"
    }

    fn data_type(&self, data_type: &DataType) -> String {
        match data_type {
            DataType::Double => "real".into(),
            DataType::Json => "text".into(),
            DataType::Varchar(Some(len)) => format!("varchar({len})"),
            DataType::Varchar(None) => "varchar".into(),
            DataType::Integer => "integer".into(),
            DataType::BigInt => "bigint".into(),
            DataType::Text => "text".into(),
            DataType::Boolean => "boolean".into(),
            DataType::Date => "date".into(),
            DataType::Timestamp => "timestamp".into(),
        }
    }
}
