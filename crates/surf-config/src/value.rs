//! Setting Values
//!
//! Every leaf in the settings tree is one of a small set of kinds.
//! Nested maps are themselves values so that groups like `shortcuts`
//! can be addressed as a whole or by individual key.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A map of setting names to values (one level of the tree)
pub type SettingsMap = BTreeMap<String, SettingValue>;

/// A single setting value
///
/// Serialized untagged, so the JSON document stays a plain object of
/// booleans, numbers, strings, string arrays and nested objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    StrSet(BTreeSet<String>),
    Map(SettingsMap),
}

/// Kind of a setting value, used for schema checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Str,
    StrSet,
    Map,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Bool => "boolean",
            Self::Int => "integer",
            Self::Float => "float",
            Self::Str => "string",
            Self::StrSet => "string set",
            Self::Map => "map",
        };
        f.write_str(name)
    }
}

impl SettingValue {
    /// Kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::StrSet(_) => ValueKind::StrSet,
            Self::Map(_) => ValueKind::Map,
        }
    }

    /// Convert into the requested kind if that is lossless.
    ///
    /// Integers widen to floats; nothing else converts.
    pub fn coerce(self, kind: ValueKind) -> Option<Self> {
        match (self, kind) {
            (Self::Int(i), ValueKind::Float) => Some(Self::Float(i as f64)),
            (value, kind) if value.kind() == kind => Some(value),
            _ => None,
        }
    }

    /// Build a value from arbitrary JSON.
    ///
    /// Returns `None` for `null`, mixed arrays and numbers that fit
    /// neither `i64` nor `f64`. Objects convert recursively, dropping
    /// members that do not convert.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            Value::String(s) => Some(Self::Str(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<BTreeSet<_>>>()
                .map(Self::StrSet),
            Value::Object(members) => Some(Self::Map(
                members
                    .iter()
                    .filter_map(|(k, v)| Self::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value as float (integers included)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::StrSet(set) => Some(set),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&SettingsMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl std::fmt::Display for SettingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "<{}>", self.kind()),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<BTreeSet<String>> for SettingValue {
    fn from(value: BTreeSet<String>) -> Self {
        Self::StrSet(value)
    }
}

impl From<SettingsMap> for SettingValue {
    fn from(value: SettingsMap) -> Self {
        Self::Map(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_int_widens_to_float() {
        assert_eq!(
            SettingValue::Int(1).coerce(ValueKind::Float),
            Some(SettingValue::Float(1.0))
        );
        assert_eq!(SettingValue::Float(1.5).coerce(ValueKind::Int), None);
        assert_eq!(SettingValue::from("x").coerce(ValueKind::Bool), None);
    }

    #[test]
    fn test_from_json() {
        let value = SettingValue::from_json(&json!({
            "a": true,
            "b": 3,
            "c": 0.25,
            "d": ["x", "y"],
            "e": null,
            "f": [1, 2],
        }))
        .unwrap();

        let map = value.as_map().unwrap();
        assert_eq!(map["a"], SettingValue::Bool(true));
        assert_eq!(map["b"], SettingValue::Int(3));
        assert_eq!(map["c"], SettingValue::Float(0.25));
        assert_eq!(map["d"].as_str_set().unwrap().len(), 2);
        assert!(!map.contains_key("e"));
        assert!(!map.contains_key("f"));
    }

    #[test]
    fn test_float_survives_json() {
        let json = serde_json::to_value(SettingValue::Float(1.0)).unwrap();
        assert_eq!(SettingValue::from_json(&json), Some(SettingValue::Float(1.0)));
    }
}
