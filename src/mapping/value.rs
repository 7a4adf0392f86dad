//! Typed values produced by the mapper

use serde::Serialize;
use std::fmt;

/// Value of a binding after mapping
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KeyValue {
    Bool(bool),
    Int(i32),
    Number(f32),
    Text(String),
    Vector(Vec<f32>),
    Color(Vec<f32>),
}

impl KeyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            KeyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            KeyValue::Int(n) => Some(*n),
            KeyValue::Number(n) => Some(*n as i32),
            KeyValue::Bool(b) => Some(i32::from(*b)),
            _ => None,
        }
    }

    /// Wire fields of the value, one per component
    pub fn fields(&self) -> Vec<String> {
        match self {
            KeyValue::Bool(b) => vec![b.to_string()],
            KeyValue::Int(n) => vec![n.to_string()],
            KeyValue::Number(n) => vec![n.to_string()],
            KeyValue::Text(s) => vec![s.clone()],
            KeyValue::Vector(v) | KeyValue::Color(v) => v.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// `on` / `off` form of a button or toggle state
pub fn state_name(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fields().join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_per_kind() {
        assert_eq!(KeyValue::Bool(true).fields(), vec!["true"]);
        assert_eq!(KeyValue::Number(0.5).fields(), vec!["0.5"]);
        assert_eq!(KeyValue::Color(vec![1.0, 0.0, 0.25, 1.0]).to_string(), "1,0,0.25,1");
    }

    #[test]
    fn test_serializes_untagged() {
        let json = serde_json::to_value(KeyValue::Vector(vec![1.0, 2.0])).unwrap();
        assert_eq!(json, serde_json::json!([1.0, 2.0]));
        let json = serde_json::to_value(KeyValue::Text("b".into())).unwrap();
        assert_eq!(json, serde_json::json!("b"));
    }

    #[test]
    fn test_state_names() {
        assert_eq!(state_name(true), "on");
        assert_eq!(state_name(false), "off");
    }
}
