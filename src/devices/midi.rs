//! MIDI input devices and MIDI output targets

use anyhow::{anyhow, Context, Result};
use midir::{MidiInput, MidiInputConnection};
use tracing::{info, trace, warn};

use super::{Device, EventCallback, InputEvent, MidiPorts};
use crate::midi::{find_input_port, format_hex, MidiMessage};
use crate::router::DeviceKind;

/// A MIDI port, either read from (a control surface) or only written to
pub struct MidiDevice {
    name: String,
    kind: DeviceKind,
    input: Option<MidiInputConnection<()>>,
    ports: Option<MidiPorts>,
}

impl MidiDevice {
    /// Control surface matched by (partial) port name
    pub fn input(name: &str) -> Self {
        Self::with_kind(name, DeviceKind::Midi)
    }

    /// Output target; published as a virtual port when no such port exists
    pub fn output(name: &str) -> Self {
        Self::with_kind(name, DeviceKind::Output)
    }

    fn with_kind(name: &str, kind: DeviceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            input: None,
            ports: None,
        }
    }
}

impl Device for MidiDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DeviceKind {
        self.kind
    }

    fn open_input(&mut self, events: EventCallback) -> Result<()> {
        if self.kind != DeviceKind::Midi {
            return Ok(());
        }

        let midi_in = MidiInput::new("surface-gw-in").context("Failed to create MIDI input")?;
        let (port, port_name) = find_input_port(&midi_in, &self.name)
            .ok_or_else(|| anyhow!("Input port '{}' not found", self.name))?;

        let device = self.name.clone();
        let connection = midi_in
            .connect(
                &port,
                &format!("surface-gw-{}", self.name),
                move |_timestamp, data, _| {
                    let event = MidiMessage::parse(data).and_then(|m| m.control_event());
                    match event {
                        Some((key, value)) => events(InputEvent {
                            device: device.clone(),
                            key,
                            value,
                        }),
                        None => trace!("{} ignored: {}", device, format_hex(data)),
                    }
                },
                (),
            )
            .map_err(|e| anyhow!("Failed to connect to input port '{}': {}", port_name, e))?;

        info!("Listening to '{}' ({})", self.name, port_name);
        self.input = Some(connection);
        Ok(())
    }

    fn open_output(&mut self, ports: &MidiPorts) -> Result<()> {
        self.ports = Some(ports.clone());

        match ports.open(&self.name, &self.name) {
            Ok(_) => Ok(()),
            Err(e) if self.kind == DeviceKind::Output => {
                warn!("{:#}, publishing a virtual port instead", e);
                ports.open_virtual(&self.name)
            }
            Err(e) => Err(e),
        }
    }

    fn stop(&mut self) {
        if let Some(connection) = self.input.take() {
            connection.close();
        }
        if let Some(ports) = self.ports.take() {
            ports.close(&self.name);
        }
    }

    fn is_open(&self) -> bool {
        match self.kind {
            DeviceKind::Midi => self.input.is_some(),
            _ => self
                .ports
                .as_ref()
                .map(|p| p.is_open(&self.name))
                .unwrap_or(false),
        }
    }
}
