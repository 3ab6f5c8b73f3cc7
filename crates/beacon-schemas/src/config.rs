//! Typed accessors over a Check's free-form `config` payload.
//!
//! The worker-specific config (HTTP method, TCP port, GraphQL query, ...) is
//! stored as `mapping from string to JSON value` rather than a typed struct
//! per check type: the scheduler core itself never interprets most of these
//! keys, only validates the ones its own invariants depend on.

use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConfigMap(pub BTreeMap<String, Value>);

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }
}

impl From<Value> for ConfigMap {
    fn from(v: Value) -> Self {
        match v {
            Value::Object(map) => ConfigMap(map.into_iter().collect()),
            _ => ConfigMap::default(),
        }
    }
}

impl From<ConfigMap> for Value {
    fn from(c: ConfigMap) -> Self {
        Value::Object(c.0.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_accessors_read_through_json_value() {
        let mut cfg = ConfigMap::new();
        cfg.set("method", json!("POST"));
        cfg.set("port", json!(8080));
        cfg.set("strict", json!(true));

        assert_eq!(cfg.string("method"), Some("POST"));
        assert_eq!(cfg.int("port"), Some(8080));
        assert_eq!(cfg.bool("strict"), Some(true));
        assert_eq!(cfg.int("method"), None);
    }
}
