use super::Dialect;
use crate::ast::DataType;

/// MySQL: backtick identifiers, `?` placeholders, no `returning`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl Dialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn identifier_quote(&self) -> char {
        '`'
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn supports_returning(&self) -> bool {
        false
    }

    fn supports_offset_without_limit(&self) -> bool {
        false
    }

    fn autoincrement_primary_key(&self) -> &'static str {
        "integer auto_increment primary key"
    }

    fn default_values(&self) -> &'static str {
        "() values ()"
    }

    fn data_type(&self, data_type: &DataType) -> String {
        match data_type {
            // MySQL requires a length on varchar.
            DataType::Varchar(None) => "varchar(255)".into(),
            DataType::Double => "double".into(),
            DataType::Timestamp => "datetime".into(),
            DataType::Boolean => "tinyint(1)".into(),
            DataType::Varchar(Some(len)) => format!("varchar({len})"),
            DataType::Integer => "integer".into(),
            DataType::BigInt => "bigint".into(),
            DataType::Text => "text".into(),
            DataType::Date => "date".into(),
            DataType::Json => "json".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_spelling() {
        assert_eq!(MysqlDialect.data_type(&DataType::Varchar(None)), "varchar(255)");
        assert_eq!(MysqlDialect.data_type(&DataType::Timestamp), "datetime");
        assert_eq!(MysqlDialect.placeholder(3), "?");
    }
}
