//! Typed key/value parameter storage.
//!
//! Keys are namespaced by node name: the `publish-raw-topic` option of the
//! node `left` lives under `left.publish-raw-topic`.

use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    path::Path,
    sync::{PoisonError, RwLock},
};

use serde::{Deserialize, Serialize};

use crate::error::{NodeError, NodeResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Double(_) => "double",
            ParamValue::String(_) => "string",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            ParamValue::Double(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Double(v) => write!(f, "{}", v),
            ParamValue::String(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Double(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::String(v)
    }
}

/// A single named change, as delivered by a runtime parameter update.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: ParamValue,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

pub trait ParameterStore: Send + Sync {
    fn get(&self, key: &str) -> Option<ParamValue>;
    fn set(&self, key: &str, value: ParamValue);

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Sets `key` only if nothing is stored yet; returns the effective value.
    fn declare(&self, key: &str, default: ParamValue) -> ParamValue {
        match self.get(key) {
            Some(v) => v,
            None => {
                self.set(key, default.clone());
                default
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryParameterStore {
    values: RwLock<HashMap<String, ParamValue>>,
}

impl MemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON document. Nested objects become dotted keys:
    /// `{"left": {"fps": 30}}` yields `left.fps`.
    pub fn from_json_str(json: &str) -> NodeResult<Self> {
        let root: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| NodeError::config(format!("invalid parameter file: {}", e)))?;
        let store = Self::new();
        store.merge_json("", &root)?;
        Ok(store)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> NodeResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            NodeError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    fn merge_json(&self, prefix: &str, value: &serde_json::Value) -> NodeResult<()> {
        match value {
            serde_json::Value::Object(map) => {
                for (k, v) in map {
                    let key = if prefix.is_empty() {
                        k.clone()
                    } else {
                        format!("{}.{}", prefix, k)
                    };
                    self.merge_json(&key, v)?;
                }
                Ok(())
            }
            serde_json::Value::Null => Ok(()),
            other => {
                if prefix.is_empty() {
                    return Err(NodeError::config("parameter file must be a JSON object"));
                }
                let v: ParamValue = serde_json::from_value(other.clone()).map_err(|_| {
                    NodeError::config(format!("unsupported value for {}: {}", prefix, other))
                })?;
                self.set(prefix, v);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ParameterStore for MemoryParameterStore {
    fn get(&self, key: &str) -> Option<ParamValue> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: ParamValue) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }
}

/// Typed view of one node's namespace in a store.
pub struct ParamReader<'a> {
    store: &'a dyn ParameterStore,
    prefix: &'a str,
}

impl<'a> ParamReader<'a> {
    pub fn new(store: &'a dyn ParameterStore, prefix: &'a str) -> Self {
        Self { store, prefix }
    }

    pub fn full_name(&self, key: &str) -> String {
        format!("{}.{}", self.prefix, key)
    }

    /// Strips this node's namespace from a full parameter name.
    pub fn local_name<'n>(&self, full: &'n str) -> Option<&'n str> {
        full.strip_prefix(self.prefix)?.strip_prefix('.')
    }

    fn required(&self, key: &str) -> NodeResult<ParamValue> {
        self.store
            .get(&self.full_name(key))
            .ok_or_else(|| NodeError::config(format!("missing parameter {}", self.full_name(key))))
    }

    fn mismatch(&self, key: &str, expected: &str, found: &ParamValue) -> NodeError {
        NodeError::config(format!(
            "parameter {} must be {}, found {} {}",
            self.full_name(key),
            expected,
            found.type_name(),
            found
        ))
    }

    pub fn get_bool(&self, key: &str) -> NodeResult<bool> {
        let v = self.required(key)?;
        v.as_bool().ok_or_else(|| self.mismatch(key, "bool", &v))
    }

    pub fn get_int(&self, key: &str) -> NodeResult<i64> {
        let v = self.required(key)?;
        v.as_int().ok_or_else(|| self.mismatch(key, "int", &v))
    }

    pub fn get_double(&self, key: &str) -> NodeResult<f64> {
        let v = self.required(key)?;
        v.as_double().ok_or_else(|| self.mismatch(key, "double", &v))
    }

    pub fn get_string(&self, key: &str) -> NodeResult<String> {
        let v = self.required(key)?;
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| self.mismatch(key, "string", &v))
    }

    /// Integer restricted to `min..=max`.
    pub fn get_ranged(&self, key: &str, min: i64, max: i64) -> NodeResult<i64> {
        let v = self.get_int(key)?;
        if v < min || v > max {
            return Err(NodeError::config(format!(
                "parameter {} = {} is outside {}..={}",
                self.full_name(key),
                v,
                min,
                max
            )));
        }
        Ok(v)
    }

    pub fn declare(&self, key: &str, default: impl Into<ParamValue>) -> ParamValue {
        self.store.declare(&self.full_name(key), default.into())
    }

    pub fn set(&self, key: &str, value: impl Into<ParamValue>) {
        self.store.set(&self.full_name(key), value.into());
    }
}

#[cfg(test)]
#[path = "params_test.rs"]
mod params_test;
