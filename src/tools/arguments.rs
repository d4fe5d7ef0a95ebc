//! Typed access to tool call arguments.

use crate::error::KrutrimError;

/// Wrapper around the JSON arguments of a tool call.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    pub fn into_inner(self) -> serde_json::Value {
        self.value
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, KrutrimError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| missing("string", key))
    }

    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, KrutrimError> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| missing("integer", key))
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, KrutrimError> {
        self.value
            .get(key)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| missing("number", key))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, KrutrimError> {
        self.value
            .get(key)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| missing("boolean", key))
    }

    /// Deserialize the whole argument object into a typed struct.
    ///
    /// A string holding JSON is parsed first; an empty string means `{}`.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, KrutrimError> {
        serde_json::from_value(self.normalized()?).map_err(|e| {
            KrutrimError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }

    /// The arguments as a JSON object map, as MCP `tools/call` expects.
    pub fn to_object(&self) -> Result<Option<serde_json::Map<String, serde_json::Value>>, KrutrimError> {
        match self.normalized()? {
            serde_json::Value::Null => Ok(None),
            serde_json::Value::Object(map) => Ok(Some(map)),
            other => Err(KrutrimError::InvalidArgument(format!(
                "Tool arguments must be a JSON object, got {other}"
            ))),
        }
    }

    fn normalized(&self) -> Result<serde_json::Value, KrutrimError> {
        match &self.value {
            serde_json::Value::String(raw) if raw.trim().is_empty() => Ok(serde_json::json!({})),
            serde_json::Value::String(raw) => serde_json::from_str(raw.trim()).map_err(|e| {
                KrutrimError::InvalidArgument(format!("Arguments are not valid JSON: {e}"))
            }),
            other => Ok(other.clone()),
        }
    }
}

impl From<serde_json::Value> for ToolArguments {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}

fn missing(kind: &str, key: &str) -> KrutrimError {
    KrutrimError::InvalidArgument(format!("Missing {kind} argument: {key}"))
}
