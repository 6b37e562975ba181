/// Operation tree, rewriting and SQL compilation.
///
/// Every query flows through the same pipeline:
///
/// ```text
/// Builder calls
///       ↓
/// Operation tree          (types.rs, value.rs)
///       ↓
/// Plugins / rewrite rules (plugin.rs, transformer.rs)
///       ↓
/// Dialect compiler        (compiler/)
///       ↓
/// Execution               (db/ module)
/// ```
///
/// Plugins shipped with the crate: `CamelCasePlugin` (camel_case.rs) and
/// `WithSchemaPlugin` (with_schema.rs).
pub mod camel_case;
pub mod compiler;
pub mod plugin;
pub mod transformer;
pub mod types;
pub mod value;
pub mod with_schema;

// Re-export key types for convenience
pub use camel_case::{CamelCaseOptions, CamelCasePlugin};
pub use compiler::{
    CompiledQuery, Dialect, DialectKind, MysqlDialect, PostgresDialect, QueryCompiler,
    SqliteDialect,
};
pub use plugin::{PluginInfo, PluginRegistry, QueryPlugin};
pub use transformer::{transform, NodeTransformer, RuleSet};
pub use types::*;
pub use value::Value;
pub use with_schema::WithSchemaPlugin;
