//! FILENAME: core/expr-engine/src/row.rs
//! PURPOSE: A single data row handed to the report engine by a row source.
//! CONTEXT: Rows are homogeneous maps of field name to value. Field paths
//! such as `customer.address.city` walk nested maps; a numeric segment
//! indexes into a list. A path that does not resolve yields no value,
//! which is distinct from an evaluation error.

use crate::value::Value;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    fields: FxHashMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Row {
            fields: FxHashMap::default(),
        }
    }

    /// Builder-style insert, handy for fixtures.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Top-level field lookup.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Resolves a dotted field path against the row.
    /// An exact top-level key wins over path splitting, so a flat column
    /// literally named "a.b" is still reachable.
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.fields.get(path) {
            return Some(value);
        }

        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.fields.get(first)?;
        for segment in segments {
            current = current.get(segment)?;
        }
        Some(current)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Row {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Row {
            fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested_row() -> Row {
        let json = json!({
            "amount": 10,
            "customer": {"name": "Acme", "address": {"city": "Oslo"}},
            "lines": [{"sku": "A-1"}, {"sku": "B-2"}],
            "flat.key": "flat"
        });
        match json {
            serde_json::Value::Object(map) => Row::from(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn resolves_nested_paths() {
        let row = nested_row();
        assert_eq!(row.resolve("amount"), Some(&Value::Number(10.0)));
        assert_eq!(
            row.resolve("customer.address.city"),
            Some(&Value::Text("Oslo".to_string()))
        );
        assert_eq!(
            row.resolve("lines.1.sku"),
            Some(&Value::Text("B-2".to_string()))
        );
    }

    #[test]
    fn exact_key_wins_over_path_split() {
        let row = nested_row();
        assert_eq!(row.resolve("flat.key"), Some(&Value::Text("flat".to_string())));
    }

    #[test]
    fn missing_path_is_none() {
        let row = nested_row();
        assert_eq!(row.resolve("customer.phone"), None);
        assert_eq!(row.resolve("amount.value"), None);
        assert_eq!(row.resolve("nope"), None);
    }

    #[test]
    fn deserializes_from_json_object() {
        let row: Row = serde_json::from_str(r#"{"region": "A", "amount": 5}"#).unwrap();
        assert_eq!(row.get("region"), Some(&Value::Text("A".to_string())));
        assert_eq!(row.len(), 2);
    }
}
