//! Output drivers
//!
//! A [`Broadcaster`] puts one `(property, value)` pair on the wire for a
//! target. [`Outlets`] is the production one and dispatches by protocol to
//! the CSV, OSC and UDP drivers.

pub mod console;
pub mod osc;
pub mod udp;

pub use console::ConsoleDriver;
pub use osc::OscDriver;
pub use udp::UdpDriver;

use tracing::{debug, warn};

use crate::mapping::KeyValue;
use crate::target::{Protocol, Target};

/// Wire-level sender for broadcast targets
pub trait Broadcaster {
    /// Send `value` under `property` to `target`; `false` when nothing was sent
    fn broadcast(&mut self, target: &Target, property: &str, value: &KeyValue) -> bool;
}

/// Broadcaster over every supported protocol
pub struct Outlets {
    console: ConsoleDriver,
    osc: OscDriver,
    udp: UdpDriver,
}

impl Outlets {
    pub fn new() -> Self {
        Self {
            console: ConsoleDriver::stdout(),
            osc: OscDriver::new(),
            udp: UdpDriver::new(),
        }
    }
}

impl Default for Outlets {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster for Outlets {
    fn broadcast(&mut self, target: &Target, property: &str, value: &KeyValue) -> bool {
        let result = match target.protocol {
            Protocol::Csv => self.console.send(property, value),
            Protocol::Osc => self.osc.send(target, property, value),
            Protocol::Udp => self.udp.send(target, property, value),
            Protocol::Midi => {
                debug!("'{}' is a MIDI target, not a broadcast one", target);
                return false;
            }
            Protocol::Unknown => {
                warn!("Unknown protocol for '{}', dropping {} = {}", target.address, property, value);
                return true;
            }
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Broadcast to {} failed: {:#}", target, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_protocol_is_dropped_but_succeeds() {
        let mut outlets = Outlets::new();
        let target = Target::parse("carrier-pigeon");
        assert_eq!(target.protocol, Protocol::Unknown);
        assert!(outlets.broadcast(&target, "fader", &KeyValue::Number(1.0)));
    }

    #[test]
    fn test_midi_targets_are_not_broadcast() {
        let mut outlets = Outlets::new();
        let target = Target::parse("midi://IAC Bus 1");
        assert!(!outlets.broadcast(&target, "fader", &KeyValue::Number(1.0)));
    }
}
