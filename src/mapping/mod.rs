//! Type classification and value mapping
//!
//! Pure functions turning a raw 0-127 input into a typed value. No I/O
//! happens here; the router owns state and side effects.

pub mod interpolate;
pub mod kind;
pub mod points;
pub mod value;

pub use interpolate::{map_value, RAW_MAX};
pub use kind::DataType;
pub use points::{ControlPoints, StateMessage};
pub use value::{state_name, KeyValue};
