//! Shape step: run a binding's script and act on its answer

use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::store::{Binding, DeviceKind};
use crate::midi::{convert, MidiMessage};
use crate::shaper::{KeyPair, ShapeContext, ShapeResult, FEEDBACK_SUFFIX};

/// Where the pipeline goes after shaping
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ShapeOutcome {
    /// Map this (possibly replaced) raw value
    Continue(f32),
    /// The script handled the event; skip default mapping
    Done(bool),
}

impl super::Router {
    pub(crate) fn shape(
        &mut self,
        binding: &Binding,
        slot: usize,
        device: &str,
        key: u32,
        raw: f32,
    ) -> ShapeOutcome {
        let Some(handle) = binding.shape else {
            return ShapeOutcome::Continue(raw);
        };

        let ctx = ShapeContext {
            device: device.to_string(),
            type_name: binding.script_type().to_string(),
            key,
            value: raw,
            data: binding.snapshot(self.state.get(device, slot)),
        };

        let result = match self.evaluator.call(handle, &ctx) {
            Ok(result) => result,
            Err(e) => {
                warn!("Shape of '{}' failed: {}", binding.name, e);
                return ShapeOutcome::Done(false);
            }
        };

        match ShapeResult::interpret(&result) {
            ShapeResult::Pass => ShapeOutcome::Continue(raw),
            ShapeResult::Gate(open) => {
                trace!("Shape of '{}' gated: {}", binding.name, open);
                if open {
                    ShapeOutcome::Continue(raw)
                } else {
                    ShapeOutcome::Done(false)
                }
            }
            ShapeResult::Override(value) => ShapeOutcome::Continue(value),
            ShapeResult::Pairs(pairs) => {
                // Pairs re-enter the mapper on this very binding
                let mut routed = false;
                for (k, v) in pairs {
                    routed |= self.map(binding, slot, device, k, v);
                }
                ShapeOutcome::Done(routed)
            }
            ShapeResult::Routes(routes) => {
                let mut routed = false;
                for (property, pairs) in routes {
                    routed |= self.dispatch_route(&property, &pairs);
                }
                ShapeOutcome::Done(routed)
            }
            ShapeResult::Unsupported(what) => {
                warn!(
                    "Shape of '{}' returned {}, which is not supported",
                    binding.name, what
                );
                ShapeOutcome::Done(false)
            }
        }
    }

    /// Handle one property of an object result
    fn dispatch_route(&mut self, property: &str, pairs: &[KeyPair]) -> bool {
        let store = Arc::clone(&self.store);

        if let Some(device) = property.strip_suffix(FEEDBACK_SUFFIX) {
            let Some(entry) = store.device(device) else {
                warn!("Feedback requested for unknown device '{}'", device);
                return false;
            };

            let mut sent = false;
            for &(k, v) in pairs {
                let stateful = store
                    .lookup(device, k)
                    .map(|(_, b)| b.data_type.is_stateful())
                    .unwrap_or(false);
                if entry.kind == DeviceKind::Midi && stateful {
                    sent |= self.feedback.reflect(device, entry.kind, k, v);
                } else {
                    trace!("Skipping LED feedback for {}[{}]", device, k);
                }
            }
            return sent;
        }

        let Some(entry) = store.device(property) else {
            warn!("Shape result names unknown device '{}'", property);
            return false;
        };

        let mut routed = false;
        match entry.kind {
            DeviceKind::Output => {
                for &(k, v) in pairs {
                    let message = MidiMessage::NoteOn {
                        channel: 0,
                        note: k.min(127) as u8,
                        velocity: convert::clamp_7bit(v),
                    };
                    match self.midi.send(property, &message) {
                        Ok(()) => routed = true,
                        Err(e) => warn!("Send to '{}' failed: {:#}", property, e),
                    }
                }
            }
            DeviceKind::Midi | DeviceKind::Pulse => {
                for &(k, v) in pairs {
                    match store.lookup(property, k) {
                        Some((slot, binding)) => {
                            debug!("Shape triggers {}[{}] = {}", property, k, v);
                            routed |= self.map(binding, slot, property, k, v);
                        }
                        None => warn!("Shape result names unbound key {} on '{}'", k, property),
                    }
                }
            }
        }
        routed
    }
}
