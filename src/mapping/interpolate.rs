//! Raw input to typed value conversion
//!
//! Raw values are the 0-127 range of a MIDI data byte. Continuous kinds
//! interpolate piecewise-linearly over their control points; categorical
//! kinds pick an entry.

use super::{ControlPoints, DataType, KeyValue};

/// Upper bound of a raw input value
pub const RAW_MAX: f32 = 127.0;

const VECTOR_ZERO: [f32; 3] = [0.0; 3];
const COLOR_ZERO: [f32; 4] = [0.0; 4];

/// Neighbouring control points around a normalised position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub low: usize,
    pub high: usize,
    pub frac: f32,
}

/// Locate `raw` among `len` evenly spread control points.
///
/// Needs at least two points. Indices never leave `[0, len - 1]`.
pub fn segment(raw: f32, len: usize) -> Option<Segment> {
    if len < 2 {
        return None;
    }

    let span = (len - 1) as f32;
    let pos = ((raw / RAW_MAX) * span).clamp(0.0, span);
    let low = (pos.floor() as usize).min(len - 1);
    let high = (low + 1).min(len - 1);

    Some(Segment {
        low,
        high,
        frac: pos - low as f32,
    })
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Index of the category picked by `raw`; 127 selects the last entry
pub fn category_index(raw: f32, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    if raw >= RAW_MAX {
        return Some(len - 1);
    }

    let idx = ((raw / RAW_MAX) * len as f32).floor().max(0.0) as usize;
    Some(idx.min(len - 1))
}

pub fn interpolate_scalar(raw: f32, points: &[f32]) -> Option<f32> {
    let seg = segment(raw, points.len())?;
    Some(lerp(points[seg.low], points[seg.high], seg.frac))
}

/// Component-wise interpolation; a component missing on one side counts as 0
pub fn interpolate_tuple(raw: f32, points: &[Vec<f32>]) -> Option<Vec<f32>> {
    let seg = segment(raw, points.len())?;
    let (a, b) = (&points[seg.low], &points[seg.high]);
    let width = a.len().max(b.len());

    Some(
        (0..width)
            .map(|i| {
                let from = a.get(i).copied().unwrap_or(0.0);
                let to = b.get(i).copied().unwrap_or(0.0);
                lerp(from, to, seg.frac)
            })
            .collect(),
    )
}

/// Compute the new value of a binding from a raw input.
///
/// Returns `None` when the input leaves the value untouched, which only
/// happens for a toggle receiving a release (`raw <= 0`).
pub fn map_value(
    data_type: DataType,
    points: &ControlPoints,
    raw: f32,
    prior: Option<&KeyValue>,
) -> Option<KeyValue> {
    let value = match data_type {
        DataType::Button => KeyValue::Bool(raw > 0.0),
        DataType::Toggle => {
            if raw <= 0.0 {
                return None;
            }
            let was_on = prior.and_then(KeyValue::as_bool).unwrap_or(false);
            KeyValue::Bool(!was_on)
        }
        DataType::String => match points {
            ControlPoints::Labels(labels) => match category_index(raw, labels.len()) {
                Some(idx) => KeyValue::Text(labels[idx].clone()),
                None => KeyValue::Text((raw as i32).to_string()),
            },
            _ => KeyValue::Text((raw as i32).to_string()),
        },
        DataType::Number => match points {
            ControlPoints::Scalars(p) if p.len() >= 2 => {
                KeyValue::Number(interpolate_scalar(raw, p).unwrap_or(raw))
            }
            // A map too short to interpolate scales to a percentage
            ControlPoints::Scalars(_) => KeyValue::Number(raw / RAW_MAX),
            _ => KeyValue::Number(raw),
        },
        DataType::Vector => KeyValue::Vector(
            tuple_points(points)
                .and_then(|p| interpolate_tuple(raw, p))
                .unwrap_or_else(|| VECTOR_ZERO.to_vec()),
        ),
        DataType::Color => KeyValue::Color(
            tuple_points(points)
                .and_then(|p| interpolate_tuple(raw, p))
                .unwrap_or_else(|| COLOR_ZERO.to_vec()),
        ),
        DataType::MidiNote | DataType::MidiControllerChange | DataType::MidiTimingTick => {
            KeyValue::Int(raw as i32)
        }
    };

    Some(value)
}

fn tuple_points(points: &ControlPoints) -> Option<&[Vec<f32>]> {
    match points {
        ControlPoints::Tuples(p) => Some(p),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn labels(items: &[&str]) -> ControlPoints {
        ControlPoints::Labels(items.iter().map(|s| s.to_string()).collect())
    }

    fn number(value: Option<KeyValue>) -> f32 {
        match value {
            Some(KeyValue::Number(n)) => n,
            other => panic!("expected a number, got {:?}", other),
        }
    }

    #[test]
    fn test_string_lookup_edges() {
        let map = labels(&["a", "b", "c", "d"]);
        let pick = |raw| map_value(DataType::String, &map, raw, None);

        assert_eq!(pick(0.0), Some(KeyValue::Text("a".into())));
        assert_eq!(pick(127.0), Some(KeyValue::Text("d".into())));
        // (64 / 127) * 4 = 2.02
        assert_eq!(pick(64.0), Some(KeyValue::Text("c".into())));
    }

    #[test]
    fn test_string_without_map_is_decimal_raw() {
        let value = map_value(DataType::String, &ControlPoints::None, 42.7, None);
        assert_eq!(value, Some(KeyValue::Text("42".into())));
    }

    #[test]
    fn test_number_interpolation() {
        let map = ControlPoints::Scalars(vec![0.0, 100.0]);
        assert_eq!(number(map_value(DataType::Number, &map, 0.0, None)), 0.0);
        assert_eq!(number(map_value(DataType::Number, &map, 127.0, None)), 100.0);

        let half = number(map_value(DataType::Number, &map, 63.5, None));
        assert!((half - 50.0).abs() < 1e-4);

        let lower = number(map_value(DataType::Number, &map, 63.0, None));
        assert!((lower - 49.606).abs() < 1e-2);
    }

    #[test]
    fn test_number_multi_segment() {
        let map = ControlPoints::Scalars(vec![0.0, 10.0, 110.0]);
        // Halfway lands exactly on the middle point
        let mid = number(map_value(DataType::Number, &map, 63.5, None));
        assert!((mid - 10.0).abs() < 1e-4);

        // Three quarters is halfway through the second segment
        let upper = number(map_value(DataType::Number, &map, 95.25, None));
        assert!((upper - 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_number_defaults() {
        assert_eq!(number(map_value(DataType::Number, &ControlPoints::None, 90.0, None)), 90.0);

        let single = ControlPoints::Scalars(vec![5.0]);
        let pct = number(map_value(DataType::Number, &single, 127.0, None));
        assert_eq!(pct, 1.0);

        let empty = ControlPoints::Scalars(Vec::new());
        let pct = number(map_value(DataType::Number, &empty, 63.5, None));
        assert_eq!(pct, 0.5);
    }

    #[test]
    fn test_vector_and_color_default_to_zero() {
        assert_eq!(
            map_value(DataType::Vector, &ControlPoints::None, 100.0, None),
            Some(KeyValue::Vector(vec![0.0, 0.0, 0.0]))
        );
        assert_eq!(
            map_value(DataType::Color, &ControlPoints::None, 100.0, None),
            Some(KeyValue::Color(vec![0.0, 0.0, 0.0, 0.0]))
        );

        let single = ControlPoints::Tuples(vec![vec![1.0, 1.0, 1.0]]);
        assert_eq!(
            map_value(DataType::Vector, &single, 100.0, None),
            Some(KeyValue::Vector(vec![0.0, 0.0, 0.0]))
        );
    }

    #[test]
    fn test_color_interpolates_component_wise() {
        let map = ControlPoints::Tuples(vec![vec![0.0, 0.0, 0.0, 1.0], vec![1.0, 0.5, 0.0, 1.0]]);
        let value = map_value(DataType::Color, &map, 63.5, None);
        assert_eq!(value, Some(KeyValue::Color(vec![0.5, 0.25, 0.0, 1.0])));
    }

    #[test]
    fn test_toggle_flips_on_every_press() {
        let none = &ControlPoints::None;

        let first = map_value(DataType::Toggle, none, 10.0, None);
        assert_eq!(first, Some(KeyValue::Bool(true)));

        let second = map_value(DataType::Toggle, none, 10.0, first.as_ref());
        assert_eq!(second, Some(KeyValue::Bool(false)));

        assert_eq!(map_value(DataType::Toggle, none, 0.0, second.as_ref()), None);
    }

    #[test]
    fn test_midi_kinds_truncate_to_int() {
        for data_type in [
            DataType::MidiNote,
            DataType::MidiControllerChange,
            DataType::MidiTimingTick,
        ] {
            assert_eq!(
                map_value(data_type, &ControlPoints::None, 99.9, None),
                Some(KeyValue::Int(99))
            );
        }
    }

    proptest! {
        #[test]
        fn prop_button_is_pressed_above_zero(raw in 0u8..=127) {
            let value = map_value(DataType::Button, &ControlPoints::None, raw as f32, None);
            prop_assert_eq!(value, Some(KeyValue::Bool(raw > 0)));
        }

        #[test]
        fn prop_category_index_in_range(raw in 0.0f32..=127.0, len in 1usize..32) {
            let idx = category_index(raw, len).unwrap();
            prop_assert!(idx < len);
        }

        #[test]
        fn prop_segment_stays_inside(raw in 0.0f32..=127.0, len in 2usize..32) {
            let seg = segment(raw, len).unwrap();
            prop_assert!(seg.low < len && seg.high < len);
            prop_assert!(seg.low <= seg.high);
            prop_assert!((0.0..=1.0).contains(&seg.frac));
        }

        #[test]
        fn prop_two_point_interpolation_is_bounded(raw in 0.0f32..=127.0, a in -1000.0f32..1000.0, b in -1000.0f32..1000.0) {
            let value = interpolate_scalar(raw, &[a, b]).unwrap();
            prop_assert!(value >= a.min(b) - 1e-2 && value <= a.max(b) + 1e-2);
        }
    }
}
