//! Surface GW
//!
//! Turns `(device, key, raw value)` events from MIDI control surfaces and
//! timed pulses into typed values, and broadcasts them to OSC, UDP, CSV and
//! MIDI targets. Bindings are declared in YAML and may be reshaped by small
//! JavaScript functions.

pub mod cli;
pub mod config;
pub mod devices;
pub mod drivers;
pub mod gateway;
pub mod mapping;
pub mod midi;
pub mod router;
pub mod shaper;
pub mod target;
