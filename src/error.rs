//! Error taxonomy for the transform → compile → execute pipeline.
//!
//! Each variant belongs to exactly one pipeline stage. Nothing here is
//! retried: the first error aborts the whole call.

use thiserror::Error;

use crate::ast::NodeKind;

/// Crate-wide result alias.
pub type Result<T, E = QueryError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum QueryError {
    /// A rewrite produced a node that cannot occupy its position in the tree
    /// (e.g. an `Identifier` rule that returned a `ValueParameter`).
    #[error("unsupported node kind `{kind}` in {position}")]
    UnsupportedNodeKind {
        kind: NodeKind,
        position: &'static str,
    },

    /// A rewrite rule registered for `kind` failed.
    #[error("rewrite rule for `{kind}` failed: {source}")]
    Rule {
        kind: NodeKind,
        #[source]
        source: anyhow::Error,
    },

    /// A plugin hook failed outside of a rewrite rule.
    #[error("plugin `{plugin}` failed: {source}")]
    Plugin {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    /// The target dialect has no rendering for this construct.
    #[error("{dialect} does not support {construct}")]
    UnsupportedOperation {
        dialect: &'static str,
        construct: String,
    },

    /// Raw fragment text pieces must interleave with its bindings.
    #[error("raw fragment has {fragments} text pieces for {bindings} bindings")]
    InvalidRawFragment { fragments: usize, bindings: usize },

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("configuration error: {0}")]
    Config(#[source] anyhow::Error),
}

impl QueryError {
    pub fn unsupported(dialect: &'static str, construct: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            dialect,
            construct: construct.into(),
        }
    }
}

/// Opaque failure reported by a [`Driver`](crate::db::Driver).
///
/// The core never inspects it; it is handed back to the caller unchanged.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct DriverError(#[from] anyhow::Error);

impl DriverError {
    pub fn msg(message: impl std::fmt::Display + std::fmt::Debug + Send + Sync + 'static) -> Self {
        Self(anyhow::Error::msg(message))
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.0
    }
}

impl From<tokio_postgres::Error> for DriverError {
    fn from(err: tokio_postgres::Error) -> Self {
        Self(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_operation_display() {
        let err = QueryError::unsupported("MySQL", "returning clause");
        assert_eq!(err.to_string(), "MySQL does not support returning clause");
    }

    #[test]
    fn test_unsupported_node_kind_display() {
        let err = QueryError::UnsupportedNodeKind {
            kind: NodeKind::ValueParameter,
            position: "identifier slot",
        };
        assert_eq!(
            err.to_string(),
            "unsupported node kind `ValueParameter` in identifier slot"
        );
    }

    #[test]
    fn test_driver_error_is_transparent() {
        let err: QueryError = DriverError::msg("connection reset").into();
        assert_eq!(err.to_string(), "connection reset");
        assert!(matches!(err, QueryError::Driver(_)));
    }
}
