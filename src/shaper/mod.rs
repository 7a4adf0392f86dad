//! Shape scripts
//!
//! A binding may carry a `shape` script that runs before the default
//! mapping. The script sees the event through five globals (`device`, `type`,
//! `key`, `value`, `data`) and answers with a single value. That value is
//! exchanged as JSON and interpreted by [`ShapeResult::interpret`].

pub mod js;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use js::JsEvaluator;

/// Opaque handle of a registered shape function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeHandle(usize);

impl ShapeHandle {
    pub(crate) fn new(id: usize) -> Self {
        Self(id)
    }

    pub(crate) fn id(&self) -> usize {
        self.0
    }
}

/// Event context injected into a shape call
#[derive(Debug, Clone, Serialize)]
pub struct ShapeContext {
    pub device: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub key: u32,
    pub value: f32,
    /// Snapshot of the binding (config fields plus live `value` / `value_raw`)
    pub data: Value,
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("shape '{label}' failed to compile: {message}")]
    Compile { label: String, message: String },

    #[error("shape '{label}' does not evaluate to a function")]
    NotAFunction { label: String },

    #[error("shape call failed: {0}")]
    Call(String),

    #[error("unknown shape handle #{0}")]
    UnknownHandle(usize),

    #[error("shape result is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Script engine running shape functions.
///
/// Implementations are single-threaded: every call goes through `&mut self`
/// and the owner serialises them.
pub trait Evaluator {
    /// Compile `source` once and keep it callable under the returned handle
    fn register(&mut self, label: &str, source: &str) -> Result<ShapeHandle, ScriptError>;

    /// Run a registered shape with the event globals set
    fn call(&mut self, handle: ShapeHandle, ctx: &ShapeContext) -> Result<Value, ScriptError>;
}

/// A `[key, value]` pair emitted by a shape
pub type KeyPair = (u32, f32);

/// What a shape asked for
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeResult {
    /// `null` / `undefined`: keep going with the original raw value
    Pass,
    /// Boolean: gate the default mapping
    Gate(bool),
    /// Number: replace the raw value, then map
    Override(f32),
    /// Array of pairs: map each pair on the current binding instead
    Pairs(Vec<KeyPair>),
    /// Object: pairs per property (device, output port or `<device>_FEEDBACKLEDS`)
    Routes(Vec<(String, Vec<KeyPair>)>),
    /// Strings and anything else
    Unsupported(String),
}

/// Property suffix asking for LED feedback instead of mapping
pub const FEEDBACK_SUFFIX: &str = "_FEEDBACKLEDS";

impl ShapeResult {
    pub fn interpret(value: &Value) -> Self {
        match value {
            Value::Null => ShapeResult::Pass,
            Value::Bool(b) => ShapeResult::Gate(*b),
            Value::Number(n) => match n.as_f64() {
                Some(n) => ShapeResult::Override(n as f32),
                None => ShapeResult::Unsupported(n.to_string()),
            },
            // Top-level pairs are strict: exactly [key, value]
            Value::Array(items) => ShapeResult::Pairs(pairs(items, |len| len == 2)),
            Value::Object(props) => ShapeResult::Routes(
                props
                    .iter()
                    .filter_map(|(name, entry)| match entry {
                        Value::Array(items) => Some((name.clone(), pairs(items, |len| len > 1))),
                        _ => None,
                    })
                    .collect(),
            ),
            Value::String(s) => ShapeResult::Unsupported(format!("string \"{}\"", s)),
        }
    }
}

fn pairs(items: &[Value], accept_len: impl Fn(usize) -> bool) -> Vec<KeyPair> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::Array(pair) if accept_len(pair.len()) => {
                let key = pair[0].as_f64()?;
                let value = pair[1].as_f64()?;
                Some((key.max(0.0) as u32, value as f32))
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_results() {
        assert_eq!(ShapeResult::interpret(&Value::Null), ShapeResult::Pass);
        assert_eq!(ShapeResult::interpret(&json!(false)), ShapeResult::Gate(false));
        assert_eq!(ShapeResult::interpret(&json!(12.5)), ShapeResult::Override(12.5));
        assert!(matches!(
            ShapeResult::interpret(&json!("hello")),
            ShapeResult::Unsupported(_)
        ));
    }

    #[test]
    fn test_array_pairs_must_have_two_items() {
        let result = ShapeResult::interpret(&json!([[5, 80], [6], [7, 1, 2], "x", [8, 0.5]]));
        assert_eq!(result, ShapeResult::Pairs(vec![(5, 80.0), (8, 0.5)]));
    }

    #[test]
    fn test_object_routes_keep_property_order() {
        let result = ShapeResult::interpret(&json!({
            "pads_FEEDBACKLEDS": [[36, 1]],
            "ignored": 3,
            "pads": [[36, 127], [37, 0, "extra"]],
            "fx": [[1, 2]]
        }));

        let ShapeResult::Routes(routes) = result else {
            panic!("expected routes");
        };
        let names: Vec<&str> = routes.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["pads_FEEDBACKLEDS", "pads", "fx"]);

        let pads = &routes.iter().find(|(n, _)| n == "pads").unwrap().1;
        assert_eq!(pads, &vec![(36, 127.0), (37, 0.0)]);
    }

    #[test]
    fn test_context_serializes_type_field() {
        let ctx = ShapeContext {
            device: "pads".into(),
            type_name: "toggle".into(),
            key: 36,
            value: 127.0,
            data: json!({"name": "kick"}),
        };
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["type"], "toggle");
        assert_eq!(json["data"]["name"], "kick");
    }
}
