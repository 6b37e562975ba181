/// Plugin architecture for rewriting queries and their results.
///
/// A plugin hooks the pipeline twice: once on the outbound operation tree
/// before compilation, once on the inbound rows after execution. Plugins run
/// outbound in registration order and inbound in reverse, so a stack of
/// plugins behaves like nested encode/decode layers.
use tracing::debug;

use super::types::OperationNode;
use crate::db::Row;
use crate::error::Result;

/// Trait that all query plugins must implement.
///
/// Plugins must not keep per-call state: the same instance may transform
/// many independent trees, concurrently.
///
/// # Example
///
/// ```ignore
/// struct LowerCaseTables { rules: RuleSet }
///
/// impl QueryPlugin for LowerCaseTables {
///     fn name(&self) -> &str { "lower-case-tables" }
///     fn transform_query(&self, node: OperationNode) -> Result<OperationNode> {
///         transform(node, &self.rules)
///     }
/// }
/// ```
pub trait QueryPlugin: Send + Sync {
    /// Unique plugin identifier.
    fn name(&self) -> &str;

    /// Optional description.
    fn description(&self) -> &str {
        ""
    }

    /// Rewrite the outbound tree.
    fn transform_query(&self, node: OperationNode) -> Result<OperationNode>;

    /// Rewrite the inbound rows. Passes them through by default.
    fn transform_result(&self, rows: Vec<Row>) -> Result<Vec<Row>> {
        Ok(rows)
    }
}

#[derive(Debug, Clone)]
pub struct PluginInfo {
    pub name: String,
    pub description: String,
}

/// Ordered list of installed plugins.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn QueryPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin. Later plugins see the output of earlier ones.
    pub fn add_plugin(&mut self, plugin: Box<dyn QueryPlugin>) {
        debug!(plugin = plugin.name(), "registering query plugin");
        self.plugins.push(plugin);
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// List installed plugins in registration order.
    pub fn loaded_plugins(&self) -> Vec<PluginInfo> {
        self.plugins
            .iter()
            .map(|p| PluginInfo {
                name: p.name().to_string(),
                description: p.description().to_string(),
            })
            .collect()
    }

    /// Run every plugin's outbound hook, first registered first.
    pub fn transform_query(&self, node: OperationNode) -> Result<OperationNode> {
        let mut current = node;
        for plugin in &self.plugins {
            debug!(plugin = plugin.name(), "transforming query");
            current = plugin.transform_query(current)?;
        }
        Ok(current)
    }

    /// Run every plugin's inbound hook, last registered first.
    pub fn transform_result(&self, rows: Vec<Row>) -> Result<Vec<Row>> {
        let mut current = rows;
        for plugin in self.plugins.iter().rev() {
            debug!(plugin = plugin.name(), "transforming result rows");
            current = plugin.transform_result(current)?;
        }
        Ok(current)
    }
}
