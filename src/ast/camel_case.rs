/// camelCase ⇄ snake_case naming plugin.
///
/// Outbound, every non-raw identifier (tables, columns, aliases, schemas) is
/// converted from the application's camelCase to the database's snake_case.
/// Inbound, every row key is converted back. Because alias definitions and
/// alias references are both plain identifiers in the tree, a self-join alias
/// is spelled identically at every site after the rewrite.
use serde::Deserialize;

use super::plugin::QueryPlugin;
use super::transformer::{transform, RuleSet};
use super::types::{Identifier, NodeKind, OperationNode};
use super::value::Value;
use crate::db::Row;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CamelCaseOptions {
    /// Emit SCREAMING_SNAKE_CASE outbound.
    pub upper_case: bool,
    /// `field2` → `field_2` instead of `field2`.
    pub underscore_before_digits: bool,
    /// `fooBAR` → `foo_b_a_r` instead of `foo_bar`.
    pub underscore_between_uppercase_letters: bool,
    /// Leave keys of JSON objects nested in row values as the database sent them.
    pub maintain_nested_object_keys: bool,
}

/// Convert an application name to its storage spelling.
pub fn snake_case(input: &str, options: &CamelCaseOptions) -> String {
    let mut chars = input.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut out = String::with_capacity(input.len() + 4);
    out.extend(first.to_lowercase());

    let mut prev = first;
    for ch in chars {
        if options.underscore_before_digits && ch.is_ascii_digit() && !prev.is_ascii_digit() {
            out.push('_');
            out.push(ch);
        } else if ch.is_uppercase() {
            if options.underscore_between_uppercase_letters || !prev.is_uppercase() {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
        prev = ch;
    }

    if options.upper_case {
        out.to_uppercase()
    } else {
        out
    }
}

/// Convert a storage name back to its application spelling.
pub fn camel_case(input: &str, options: &CamelCaseOptions) -> String {
    let lowered;
    let source = if options.upper_case && !input.chars().any(char::is_lowercase) {
        lowered = input.to_lowercase();
        lowered.as_str()
    } else {
        input
    };

    let mut chars = source.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut out = String::with_capacity(source.len());
    out.push(first);

    let mut prev = first;
    for ch in chars {
        if ch != '_' {
            if prev == '_' {
                out.extend(ch.to_uppercase());
            } else {
                out.push(ch);
            }
        }
        prev = ch;
    }
    out
}

pub struct CamelCasePlugin {
    options: CamelCaseOptions,
    rules: RuleSet,
}

impl CamelCasePlugin {
    pub fn new() -> Self {
        Self::with_options(CamelCaseOptions::default())
    }

    pub fn with_options(options: CamelCaseOptions) -> Self {
        let rule_options = options.clone();
        let rules = RuleSet::new().with_rule(NodeKind::Identifier, move |node| match node {
            OperationNode::Identifier(id) if !id.raw => {
                Ok(Identifier::new(snake_case(&id.name, &rule_options)).into())
            }
            other => Ok(other),
        });
        Self { options, rules }
    }

    pub fn options(&self) -> &CamelCaseOptions {
        &self.options
    }

    fn map_row(&self, row: Row) -> Row {
        row.map_fields(|key, value| {
            let value = if self.options.maintain_nested_object_keys {
                value
            } else {
                self.map_nested(value)
            };
            (camel_case(&key, &self.options), value)
        })
    }

    fn map_nested(&self, value: Value) -> Value {
        match value {
            Value::Json(json) => Value::Json(self.map_json(json)),
            other => other,
        }
    }

    fn map_json(&self, json: serde_json::Value) -> serde_json::Value {
        match json {
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(k, v)| (camel_case(&k, &self.options), self.map_json(v)))
                    .collect(),
            ),
            serde_json::Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(|v| self.map_json(v)).collect())
            }
            other => other,
        }
    }
}

impl Default for CamelCasePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryPlugin for CamelCasePlugin {
    fn name(&self) -> &str {
        "camel-case"
    }

    fn description(&self) -> &str {
        "Maps camelCase identifiers to snake_case and result keys back"
    }

    fn transform_query(&self, node: OperationNode) -> Result<OperationNode> {
        transform(node, &self.rules)
    }

    fn transform_result(&self, rows: Vec<Row>) -> Result<Vec<Row>> {
        Ok(rows.into_iter().map(|row| self.map_row(row)).collect())
    }
}
