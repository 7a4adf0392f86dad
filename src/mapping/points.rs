//! Control point tables compiled from a binding's `map`
//!
//! The same YAML `map` means different things per data kind: numbers to
//! interpolate, tuples to interpolate component-wise, labels to pick from, or
//! per-state messages for buttons and toggles. It is compiled once at load.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

use super::DataType;
use crate::config::ControlMap;

/// One broadcast emitted for a button/toggle state
#[derive(Debug, Clone, PartialEq)]
pub struct StateMessage {
    /// Property to send under; `None` means the binding's name
    pub property: Option<String>,
    pub message: String,
}

/// Compiled control points
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ControlPoints {
    #[default]
    None,
    Scalars(Vec<f32>),
    Tuples(Vec<Vec<f32>>),
    Labels(Vec<String>),
    States(IndexMap<String, Vec<StateMessage>>),
}

impl ControlPoints {
    /// Compile a raw `map` for the given kind; `label` names the binding in
    /// load-time warnings
    pub fn compile(data_type: DataType, map: Option<&ControlMap>, label: &str) -> Self {
        let Some(map) = map else {
            return ControlPoints::None;
        };

        match (data_type, map) {
            (DataType::Button | DataType::Toggle, ControlMap::States(table)) => {
                ControlPoints::States(
                    table
                        .iter()
                        .map(|(state, entry)| (state.clone(), state_messages(entry, label)))
                        .collect(),
                )
            }
            (DataType::String, ControlMap::Points(points)) => {
                ControlPoints::Labels(points.iter().map(scalar_text).collect())
            }
            (DataType::Number, ControlMap::Points(points)) => ControlPoints::Scalars(
                points
                    .iter()
                    .map(|p| {
                        scalar_number(p).unwrap_or_else(|| {
                            warn!("'{}': control point {} is not a number, using 0", label, p);
                            0.0
                        })
                    })
                    .collect(),
            ),
            (DataType::Vector | DataType::Color, ControlMap::Points(points)) => {
                let is_color = data_type == DataType::Color;
                ControlPoints::Tuples(
                    points
                        .iter()
                        .map(|p| {
                            tuple(p, is_color).unwrap_or_else(|| {
                                warn!("'{}': control point {} is not a tuple, using zero", label, p);
                                Vec::new()
                            })
                        })
                        .collect(),
                )
            }
            // Present but unusable: still a scale, with nothing to interpolate
            (DataType::Number, ControlMap::States(_)) => {
                warn!("'{}': state table on a number, mapping as a percentage", label);
                ControlPoints::Scalars(Vec::new())
            }
            (data_type, _) => {
                warn!("'{}': map shape does not fit type '{}', ignoring it", label, data_type);
                ControlPoints::None
            }
        }
    }

    pub fn is_states(&self) -> bool {
        matches!(self, ControlPoints::States(_))
    }

    /// Messages configured for a state (`on` / `off`), `None` if the state has
    /// no entry
    pub fn state(&self, state: &str) -> Option<&[StateMessage]> {
        match self {
            ControlPoints::States(table) => table.get(state).map(Vec::as_slice),
            _ => None,
        }
    }
}

/// Entry of a state table: a message, a `[property, message]` pair, or a
/// sequence of those
fn state_messages(entry: &Value, label: &str) -> Vec<StateMessage> {
    match entry {
        Value::Array(items) if is_pair(items) => vec![pair(&items[0], &items[1])],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Array(inner) if inner.len() >= 2 => Some(pair(&inner[0], &inner[1])),
                Value::Array(_) | Value::Object(_) | Value::Null => {
                    warn!("'{}': ignoring malformed state message {}", label, item);
                    None
                }
                scalar => Some(StateMessage {
                    property: None,
                    message: scalar_text(scalar),
                }),
            })
            .collect(),
        Value::Null => Vec::new(),
        scalar => vec![StateMessage {
            property: None,
            message: scalar_text(scalar),
        }],
    }
}

fn is_pair(items: &[Value]) -> bool {
    items.len() == 2 && items.iter().all(|v| !v.is_array() && !v.is_object())
}

fn pair(property: &Value, message: &Value) -> StateMessage {
    StateMessage {
        property: Some(scalar_text(property)),
        message: scalar_text(message),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn scalar_number(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|n| n as f32),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn tuple(value: &Value, is_color: bool) -> Option<Vec<f32>> {
    match value {
        Value::Array(items) => items.iter().map(scalar_number).collect(),
        Value::String(s) if is_color => hex_color(s),
        other => scalar_number(other).map(|n| vec![n]),
    }
}

/// `#rrggbb` or `#rrggbbaa` as normalised components
fn hex_color(text: &str) -> Option<Vec<f32>> {
    let hex = text.trim().strip_prefix('#')?;
    if hex.len() != 6 && hex.len() != 8 {
        return None;
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| {
            let byte = u8::from_str_radix(hex.get(i..i + 2)?, 16).ok()?;
            Some(byte as f32 / 255.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn points(values: Value) -> ControlMap {
        serde_json::from_value(values).unwrap()
    }

    #[test]
    fn test_number_points() {
        let map = points(json!([0, "50", 100.5]));
        let compiled = ControlPoints::compile(DataType::Number, Some(&map), "t");
        assert_eq!(compiled, ControlPoints::Scalars(vec![0.0, 50.0, 100.5]));
    }

    #[test]
    fn test_labels_stringify_scalars() {
        let map = points(json!(["slow", 2, true]));
        let compiled = ControlPoints::compile(DataType::String, Some(&map), "t");
        assert_eq!(
            compiled,
            ControlPoints::Labels(vec!["slow".into(), "2".into(), "true".into()])
        );
    }

    #[test]
    fn test_color_points_accept_hex() {
        let map = points(json!(["#ff0000", [0, 0, 1, 1]]));
        let compiled = ControlPoints::compile(DataType::Color, Some(&map), "t");
        assert_eq!(
            compiled,
            ControlPoints::Tuples(vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 1.0, 1.0]])
        );
    }

    #[test]
    fn test_state_table_forms() {
        let map = points(json!({
            "on": ["/light", "full"],
            "off": [["/light", "dim"], "blackout", ["/fog", 0]],
        }));
        let compiled = ControlPoints::compile(DataType::Toggle, Some(&map), "t");

        assert_eq!(
            compiled.state("on").unwrap(),
            &[StateMessage {
                property: Some("/light".into()),
                message: "full".into()
            }]
        );

        let off = compiled.state("off").unwrap();
        assert_eq!(off.len(), 3);
        assert_eq!(off[1].property, None);
        assert_eq!(off[1].message, "blackout");
        assert_eq!(off[2].message, "0");
    }

    #[test]
    fn test_plain_message_uses_binding_name() {
        let map = points(json!({ "on": "go" }));
        let compiled = ControlPoints::compile(DataType::Button, Some(&map), "t");
        let on = compiled.state("on").unwrap();
        assert_eq!(on[0].property, None);
        assert_eq!(on[0].message, "go");
        assert!(compiled.state("off").is_none());
    }

    #[test]
    fn test_mismatched_shape_is_dropped() {
        let map = points(json!({ "on": "go" }));
        assert_eq!(
            ControlPoints::compile(DataType::String, Some(&map), "t"),
            ControlPoints::None
        );
        assert_eq!(ControlPoints::compile(DataType::Number, None, "t"), ControlPoints::None);
    }

    #[test]
    fn test_state_table_on_a_number_keeps_a_scale() {
        let map = points(json!({ "on": "go", "off": "stop" }));
        assert_eq!(
            ControlPoints::compile(DataType::Number, Some(&map), "t"),
            ControlPoints::Scalars(Vec::new())
        );
    }
}
