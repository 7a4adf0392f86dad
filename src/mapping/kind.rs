//! Semantic data kinds of a binding

use std::fmt;

/// Closed set of kinds a declared `type` string classifies into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Button,
    Toggle,
    String,
    Number,
    Vector,
    Color,
    MidiNote,
    MidiControllerChange,
    MidiTimingTick,
}

impl DataType {
    /// Recognise a declared type name, `None` when no alias matches.
    ///
    /// Names match exactly: `Toggle` is not an alias of `toggle`.
    pub fn from_name(name: &str) -> Option<Self> {
        let data_type = match name {
            "button" => DataType::Button,
            "toggle" => DataType::Toggle,
            "state" | "enum" | "strings" => DataType::String,
            "scalar" | "number" | "float" | "int" => DataType::Number,
            "vec2" | "vec3" | "vector" => DataType::Vector,
            "vec4" | "color" => DataType::Color,
            "note" => DataType::MidiNote,
            "cc" => DataType::MidiControllerChange,
            "tick" => DataType::MidiTimingTick,
            _ => return None,
        };
        Some(data_type)
    }

    /// Classify a binding's declared type; absent or unknown means `Number`
    pub fn classify(name: Option<&str>) -> Self {
        name.and_then(Self::from_name).unwrap_or(DataType::Number)
    }

    /// Canonical name, as handed to shape scripts
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Button => "button",
            DataType::Toggle => "toggle",
            DataType::String => "state",
            DataType::Number => "number",
            DataType::Vector => "vector",
            DataType::Color => "color",
            DataType::MidiNote => "note",
            DataType::MidiControllerChange => "cc",
            DataType::MidiTimingTick => "tick",
        }
    }

    /// Button and toggle carry an on/off state reflected back to hardware
    pub fn is_stateful(&self) -> bool {
        matches!(self, DataType::Button | DataType::Toggle)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
