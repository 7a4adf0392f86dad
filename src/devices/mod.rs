//! Event sources and MIDI outputs
//!
//! Every device exposes the same capability set through [`Device`]; the
//! [`DeviceRegistry`] owns them and tears them down explicitly. Incoming
//! events leave a device through an [`EventCallback`]; outgoing messages go
//! through the shared [`MidiPorts`] its outputs are opened into.

pub mod midi;
pub mod pulse;

pub use midi::MidiDevice;
pub use pulse::PulseDevice;

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use midir::{MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::midi::{find_output_port, format_hex, MidiMessage};
use crate::router::DeviceKind;
use crate::target::{parse_targets, Protocol};

/// One raw input for the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    pub device: String,
    pub key: u32,
    pub value: f32,
}

/// Where devices deliver their events (called from driver threads)
pub type EventCallback = Arc<dyn Fn(InputEvent) + Send + Sync>;

/// Anything that can write a MIDI message to a named port
pub trait MidiSink: Send + Sync {
    fn send(&self, port: &str, message: &MidiMessage) -> Result<()>;
}

/// Uniform capability set of an event source or output
pub trait Device: Send {
    fn name(&self) -> &str;

    fn kind(&self) -> DeviceKind;

    /// Start delivering events
    fn open_input(&mut self, events: EventCallback) -> Result<()>;

    /// Open the output side, registering it in `ports`
    fn open_output(&mut self, ports: &MidiPorts) -> Result<()>;

    /// Close everything; the device may be opened again afterwards
    fn stop(&mut self);

    fn is_open(&self) -> bool;
}

/// Open MIDI output connections, by configured name
#[derive(Clone, Default)]
pub struct MidiPorts {
    outputs: Arc<Mutex<HashMap<String, MidiOutputConnection>>>,
}

impl MidiPorts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to the first output port whose name contains `pattern`
    pub fn open(&self, name: &str, pattern: &str) -> Result<String> {
        let midi_out = MidiOutput::new("surface-gw-out").context("Failed to create MIDI output")?;

        let (port, port_name) = find_output_port(&midi_out, pattern)
            .ok_or_else(|| anyhow!("Output port '{}' not found", pattern))?;

        let connection = midi_out
            .connect(&port, &format!("surface-gw-{}", name))
            .map_err(|e| anyhow!("Failed to connect to output port '{}': {}", port_name, e))?;

        self.outputs.lock().insert(name.to_string(), connection);
        debug!("MIDI output '{}' → '{}'", name, port_name);
        Ok(port_name)
    }

    /// Publish a virtual output port other applications can read from
    #[cfg(unix)]
    pub fn open_virtual(&self, name: &str) -> Result<()> {
        use midir::os::unix::VirtualOutput;

        let midi_out = MidiOutput::new("surface-gw-out").context("Failed to create MIDI output")?;
        let connection = midi_out
            .create_virtual(name)
            .map_err(|e| anyhow!("Failed to create virtual port '{}': {}", name, e))?;

        self.outputs.lock().insert(name.to_string(), connection);
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn open_virtual(&self, name: &str) -> Result<()> {
        Err(anyhow!("Virtual port '{}' is not supported on this platform", name))
    }

    pub fn close(&self, name: &str) {
        if let Some(connection) = self.outputs.lock().remove(name) {
            connection.close();
        }
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.outputs.lock().contains_key(name)
    }
}

impl MidiSink for MidiPorts {
    fn send(&self, port: &str, message: &MidiMessage) -> Result<()> {
        let mut outputs = self.outputs.lock();
        let connection = outputs
            .get_mut(port)
            .ok_or_else(|| anyhow!("MIDI output '{}' is not open", port))?;

        let data = message.encode();
        connection
            .send(&data)
            .with_context(|| format!("Failed to send to '{}'", port))?;

        debug!("Sent to {}: {} | {}", port, format_hex(&data), message);
        Ok(())
    }
}

/// Owner of every configured device
pub struct DeviceRegistry {
    devices: Vec<Box<dyn Device>>,
    ports: MidiPorts,
}

impl DeviceRegistry {
    pub fn new(ports: MidiPorts) -> Self {
        Self {
            devices: Vec::new(),
            ports,
        }
    }

    /// Create (but do not open) the devices a configuration needs
    pub fn from_config(config: &AppConfig, ports: MidiPorts) -> Result<Self> {
        let mut registry = Self::new(ports);

        for name in config.inputs.keys() {
            registry.add(Box::new(MidiDevice::input(name)));
        }

        for pulse in &config.pulse {
            registry.add(Box::new(PulseDevice::new(&pulse.name, pulse.period()?)));
        }

        for port in midi_targets(config) {
            if !config.inputs.contains_key(&port) {
                registry.add(Box::new(MidiDevice::output(&port)));
            }
        }

        Ok(registry)
    }

    pub fn add(&mut self, device: Box<dyn Device>) {
        self.devices.push(device);
    }

    /// Open every device; a device that fails to open is reported and skipped
    pub fn open_all(&mut self, events: EventCallback) {
        for device in &mut self.devices {
            if let Err(e) = device.open_output(&self.ports) {
                match device.kind() {
                    DeviceKind::Midi => {
                        debug!("No LED feedback for '{}': {:#}", device.name(), e)
                    }
                    _ => warn!("Output of '{}' unavailable: {:#}", device.name(), e),
                }
            }

            match device.open_input(events.clone()) {
                Ok(()) => info!("🎛️  Device '{}' ({:?}) ready", device.name(), device.kind()),
                Err(e) => warn!("Device '{}' unavailable: {:#}", device.name(), e),
            }
        }

        if !self.devices.iter().any(|d| d.kind() == DeviceKind::Midi && d.is_open()) {
            warn!("Listening to no MIDI device");
            if let Ok(ports) = crate::midi::list_input_ports() {
                for port in ports {
                    warn!("  available input: {}", port);
                }
            }
        }
    }

    pub fn stop_all(&mut self) {
        for device in &mut self.devices {
            device.stop();
        }
        debug!("Stopped {} devices", self.devices.len());
    }

    /// One line per device, for the console
    pub fn describe(&self) -> Vec<String> {
        self.devices
            .iter()
            .map(|d| {
                let status = if d.is_open() {
                    "open".green()
                } else {
                    "closed".red()
                };
                format!("{:<24} {:<8} {}", d.name(), format!("{:?}", d.kind()), status)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// Distinct MIDI target port names, in configuration order
pub fn midi_targets(config: &AppConfig) -> Vec<String> {
    let mut addresses = config.default_targets();
    for bindings in config.inputs.values() {
        if let Ok(entries) = bindings.entries() {
            for (_, binding) in entries {
                if let Some(out) = &binding.out {
                    addresses.extend(out.to_vec());
                }
            }
        }
    }
    for pulse in &config.pulse {
        if let Some(out) = &pulse.out {
            addresses.extend(out.to_vec());
        }
    }

    let mut ports: Vec<String> = Vec::new();
    for target in parse_targets(&addresses) {
        if target.protocol == Protocol::Midi && !ports.contains(&target.address) {
            ports.push(target.address);
        }
    }
    ports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midi_targets_are_collected_once() {
        let config = AppConfig::from_yaml(
            r#"
out: [midi://IAC Bus 1, csv]
in:
  pads:
    - key: 36
      type: note
      out: [midi://IAC Bus 1, "midi:Synth"]
pulse:
  - name: clock
    bpm: 120
    type: tick
    out: midi://Synth
"#,
        )
        .unwrap();

        assert_eq!(midi_targets(&config), vec!["IAC Bus 1", "Synth"]);
    }

    #[test]
    fn test_registry_layout_from_config() {
        let config = AppConfig::from_yaml(
            r#"
out: midi://Synth
in:
  pads:
    - type: button
pulse:
  - name: clock
    fps: 30
"#,
        )
        .unwrap();

        let registry = DeviceRegistry::from_config(&config, MidiPorts::new()).unwrap();
        let kinds: Vec<DeviceKind> = registry.devices.iter().map(|d| d.kind()).collect();
        assert_eq!(
            kinds,
            vec![DeviceKind::Midi, DeviceKind::Pulse, DeviceKind::Output]
        );
        assert!(registry.devices.iter().all(|d| !d.is_open()));
    }

    #[test]
    fn test_send_to_closed_port_fails() {
        let ports = MidiPorts::new();
        assert!(!ports.is_open("nowhere"));
        assert!(ports.send("nowhere", &MidiMessage::TimingClock).is_err());
    }
}
