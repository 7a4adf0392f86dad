//! LED feedback to the originating device
//!
//! After a button or toggle is routed the router emits a [`StateRouted`]
//! event to every registered [`RouteHook`]. The [`FeedbackController`] is the
//! default hook: it mirrors the state as a Control Change on MIDI devices.

use std::sync::Arc;
use tracing::{trace, warn};

use super::store::DeviceKind;
use crate::devices::MidiSink;
use crate::midi::{convert, MidiMessage};

/// A button/toggle state that has just been routed
#[derive(Debug, Clone, PartialEq)]
pub struct StateRouted {
    pub device: String,
    pub kind: DeviceKind,
    pub key: u32,
    pub on: bool,
}

/// Post-routing hook for stateful keys
pub trait RouteHook {
    fn on_state_routed(&self, event: &StateRouted);
}

/// Sends Control Change messages reflecting key state back to MIDI devices
#[derive(Clone)]
pub struct FeedbackController {
    sink: Arc<dyn MidiSink>,
}

impl FeedbackController {
    pub fn new(sink: Arc<dyn MidiSink>) -> Self {
        Self { sink }
    }

    /// Set the LED of `key` on `device` to `value` (0-127).
    ///
    /// Only MIDI input devices have LEDs; other kinds fail quietly.
    pub fn reflect(&self, device: &str, kind: DeviceKind, key: u32, value: f32) -> bool {
        if kind != DeviceKind::Midi {
            trace!("No feedback for {:?} device '{}'", kind, device);
            return false;
        }

        let message = MidiMessage::ControlChange {
            channel: 0,
            cc: key.min(127) as u8,
            value: convert::clamp_7bit(value),
        };

        match self.sink.send(device, &message) {
            Ok(()) => {
                trace!("Feedback → {}: {}", device, message);
                true
            }
            Err(e) => {
                warn!("Feedback to '{}' failed: {:#}", device, e);
                false
            }
        }
    }
}

impl RouteHook for FeedbackController {
    fn on_state_routed(&self, event: &StateRouted) {
        let value = if event.on { 127.0 } else { 0.0 };
        self.reflect(&event.device, event.kind, event.key, value);
    }
}
