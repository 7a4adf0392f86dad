//! Route step: broadcast a mapped value to its targets

use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::feedback::StateRouted;
use super::store::{Binding, DeviceKind};
use crate::mapping::{state_name, DataType, KeyValue};
use crate::midi::{convert, MidiMessage};
use crate::target::{Protocol, Target};

impl super::Router {
    pub(crate) fn route(&mut self, binding: &Binding, slot: usize, device: &str, key: u32) -> bool {
        let Some(value) = self.state.get(device, slot).and_then(|s| s.value.clone()) else {
            debug!("'{}' has no value to route", binding.name);
            return false;
        };

        let store = Arc::clone(&self.store);
        let targets = store.targets_for(binding);
        // MIDI targets only carry MIDI kinds
        let broadcast: Vec<&Target> = targets
            .iter()
            .filter(|t| t.protocol != Protocol::Midi)
            .collect();

        match binding.data_type {
            DataType::Button | DataType::Toggle => {
                let on = value.as_bool().unwrap_or(false);
                let state = state_name(on);

                if binding.points.is_states() {
                    for message in binding.points.state(state).unwrap_or_default() {
                        let property = message.property.as_deref().unwrap_or(&binding.name);
                        let text = KeyValue::Text(message.message.clone());
                        for target in &broadcast {
                            self.outlets.broadcast(target, property, &text);
                        }
                    }
                } else {
                    let text = KeyValue::Text(state.to_string());
                    for target in &broadcast {
                        self.outlets.broadcast(target, &binding.name, &text);
                    }
                }

                let event = StateRouted {
                    device: device.to_string(),
                    kind: store.device(device).map(|d| d.kind).unwrap_or(DeviceKind::Pulse),
                    key,
                    on,
                };
                for hook in &self.hooks {
                    hook.on_state_routed(&event);
                }
                true
            }
            DataType::String | DataType::Number | DataType::Vector | DataType::Color => {
                for target in &broadcast {
                    self.outlets.broadcast(target, &binding.name, &value);
                }
                true
            }
            DataType::MidiNote | DataType::MidiControllerChange | DataType::MidiTimingTick => {
                let message = midi_message(binding.data_type, key, value.as_int().unwrap_or(0));
                for target in targets.iter().filter(|t| t.protocol == Protocol::Midi) {
                    match self.midi.send(&target.address, &message) {
                        Ok(()) => trace!("{} → {}", message, target.address),
                        Err(e) => warn!("Send to '{}' failed: {:#}", target.address, e),
                    }
                }
                true
            }
        }
    }
}

/// MIDI message forwarded for a MIDI-typed binding
fn midi_message(data_type: DataType, key: u32, value: i32) -> MidiMessage {
    let note = key.min(127) as u8;
    let data = convert::clamp_7bit(value as f32);

    match data_type {
        DataType::MidiNote if data == 0 => MidiMessage::NoteOff {
            channel: 0,
            note,
            velocity: 0,
        },
        DataType::MidiNote => MidiMessage::NoteOn {
            channel: 0,
            note,
            velocity: data,
        },
        DataType::MidiControllerChange => MidiMessage::ControlChange {
            channel: 0,
            cc: note,
            value: data,
        },
        _ => MidiMessage::TimingClock,
    }
}
