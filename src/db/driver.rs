use std::future::Future;

use crate::ast::{CompiledQuery, Value};
use crate::error::DriverError;

/// One result row: field name → value, in the order the driver returned them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    fields: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Set a field, replacing an existing one with the same name.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Rename every field. Fields that end up with the same name are merged:
    /// the later value wins and keeps the earlier field's position.
    pub fn map_keys(self, mut f: impl FnMut(&str) -> String) -> Self {
        self.fields.into_iter().map(|(k, v)| (f(&k), v)).collect()
    }

    /// Rewrite every field, merging duplicate names like [`map_keys`](Self::map_keys).
    pub fn map_fields(self, mut f: impl FnMut(String, Value) -> (String, Value)) -> Self {
        self.fields.into_iter().map(|(k, v)| f(k, v)).collect()
    }

    pub fn try_map_keys<E>(self, mut f: impl FnMut(&str) -> Result<String, E>) -> Result<Self, E> {
        let mut row = Self::new();
        for (k, v) in self.fields {
            row.insert(f(&k)?, v);
        }
        Ok(row)
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut row = Self::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Executes compiled SQL against a database.
///
/// Implementations own connection handling. The core calls `execute` once
/// per query and never retries.
pub trait Driver: Send + Sync {
    fn execute(
        &self,
        query: &CompiledQuery,
    ) -> impl Future<Output = Result<Vec<Row>, DriverError>> + Send;
}
