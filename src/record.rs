use serde_json::{Map, Number, Value};

/// One strategy's performance summary: an open mapping from field name to value.
/// Fields the schema does not declare ride along untouched.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct StrategyRecord(Map<String, Value>);

impl StrategyRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Absent and explicit `null` are treated the same everywhere.
    #[inline]
    pub fn is_absent(&self, field: &str) -> bool {
        matches!(self.0.get(field), None | Some(Value::Null))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).filter(|v| !v.is_null())
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn insert(&mut self, field: &str, value: Value) {
        self.0.insert(field.to_string(), value);
    }

    /// Non-finite values are dropped: JSON cannot carry them.
    pub fn set_number(&mut self, field: &str, value: f64) {
        if let Some(n) = Number::from_f64(value) {
            self.0.insert(field.to_string(), Value::Number(n));
        }
    }

    pub fn set_int(&mut self, field: &str, value: i64) {
        self.0.insert(field.to_string(), Value::from(value));
    }

    pub fn set_text(&mut self, field: &str, value: impl Into<String>) {
        self.0.insert(field.to_string(), Value::String(value.into()));
    }

    /// Removes the key and returns its value, unless it was null.
    pub fn take(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field).filter(|v| !v.is_null())
    }

    #[cfg(test)]
    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Map<String, Value>> for StrategyRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
