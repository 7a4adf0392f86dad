//! Binding store and runtime key state
//!
//! `BindingStore` is built once per configuration and never mutated.
//! `RuntimeState` holds the live `value` / `value_raw` of every binding,
//! keyed by device and binding slot so aliased keys share one state.

use anyhow::Result;
use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::{AppConfig, BindingConfig};
use crate::mapping::{ControlPoints, DataType, KeyValue};
use crate::shaper::{Evaluator, ShapeHandle};
use crate::target::{parse_targets, Protocol, Target};

/// What a device is to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Physical MIDI input, reachable for LED feedback
    Midi,
    /// Synthetic timer source
    Pulse,
    /// MIDI port only written to
    Output,
}

/// One configured control, compiled for the pipeline
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    /// Declared type string, as written
    pub type_name: Option<String>,
    pub data_type: DataType,
    pub points: ControlPoints,
    /// Target override
    pub targets: Option<Vec<Target>>,
    pub shape: Option<ShapeHandle>,
    /// Source entry, handed to shapes as `data`
    pub config: BindingConfig,
}

impl Binding {
    fn compile(
        device: &str,
        keys: &[u32],
        config: &BindingConfig,
        evaluator: &mut dyn Evaluator,
    ) -> Self {
        let first_key = keys.first().copied().unwrap_or(0);
        let label = format!("{}_{}", device, first_key);
        let data_type = DataType::classify(config.type_name.as_deref());

        let shape = config.shape.as_deref().and_then(|source| {
            match evaluator.register(&label, source) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!("Shape of '{}' disabled: {}", label, e);
                    None
                }
            }
        });

        Self {
            name: config.name.clone().unwrap_or_else(|| label.clone()),
            type_name: config.type_name.clone(),
            data_type,
            points: ControlPoints::compile(data_type, config.map.as_ref(), &label),
            targets: config.out.as_ref().map(|out| parse_targets(&out.to_vec())),
            shape,
            config: config.clone(),
        }
    }

    /// Type string handed to shapes: declared, or the canonical name
    pub fn script_type(&self) -> &str {
        self.type_name.as_deref().unwrap_or(self.data_type.as_str())
    }

    /// `data` snapshot: the config entry plus live values
    pub fn snapshot(&self, state: Option<&KeyState>) -> Value {
        let mut data = serde_json::to_value(&self.config).unwrap_or(Value::Null);
        if let (Value::Object(map), Some(state)) = (&mut data, state) {
            if let Some(value) = &state.value {
                map.insert(
                    "value".to_string(),
                    serde_json::to_value(value).unwrap_or(Value::Null),
                );
            }
            map.insert("value_raw".to_string(), Value::from(state.value_raw));
        }
        data
    }
}

#[derive(Debug, Clone)]
pub struct DeviceEntry {
    pub name: String,
    pub kind: DeviceKind,
    pub bindings: Vec<Binding>,
    /// Raw key -> binding slot
    pub keys: HashMap<u32, usize>,
}

impl DeviceEntry {
    fn new(name: &str, kind: DeviceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            bindings: Vec::new(),
            keys: HashMap::new(),
        }
    }

    fn push(&mut self, keys: &[u32], binding: Binding) {
        let slot = self.bindings.len();
        for key in keys {
            // Later bindings win on duplicated keys
            self.keys.insert(*key, slot);
        }
        self.bindings.push(binding);
    }

    pub fn slot(&self, key: u32) -> Option<usize> {
        self.keys.get(&key).copied()
    }
}

/// Devices and their bindings, as loaded
#[derive(Debug, Clone, Default)]
pub struct BindingStore {
    devices: IndexMap<String, DeviceEntry>,
    defaults: Vec<Target>,
}

impl BindingStore {
    /// Compile a configuration, registering every shape with `evaluator`
    pub fn from_config(config: &AppConfig, evaluator: &mut dyn Evaluator) -> Result<Self> {
        let mut store = Self {
            devices: IndexMap::new(),
            defaults: parse_targets(&config.default_targets()),
        };

        for (device, bindings) in &config.inputs {
            let mut entry = DeviceEntry::new(device, DeviceKind::Midi);
            for (keys, binding) in bindings.entries()? {
                entry.push(&keys, Binding::compile(device, &keys, binding, evaluator));
            }
            store.devices.insert(device.clone(), entry);
        }

        for pulse in &config.pulse {
            let binding = pulse.binding();
            let mut entry = DeviceEntry::new(&pulse.name, DeviceKind::Pulse);
            entry.push(&[0], Binding::compile(&pulse.name, &[0], &binding, evaluator));
            store.devices.insert(pulse.name.clone(), entry);
        }

        // Every MIDI target is an output-only device
        let midi_ports: Vec<String> = store
            .all_targets()
            .filter(|t| t.protocol == Protocol::Midi)
            .map(|t| t.address.clone())
            .collect();
        for port in midi_ports {
            if !store.devices.contains_key(&port) {
                store
                    .devices
                    .insert(port.clone(), DeviceEntry::new(&port, DeviceKind::Output));
            }
        }

        debug!(
            "Binding store: {} devices, {} default targets",
            store.devices.len(),
            store.defaults.len()
        );

        Ok(store)
    }

    fn all_targets(&self) -> impl Iterator<Item = &Target> {
        self.defaults.iter().chain(
            self.devices
                .values()
                .flat_map(|d| d.bindings.iter())
                .filter_map(|b| b.targets.as_ref())
                .flatten(),
        )
    }

    pub fn device(&self, name: &str) -> Option<&DeviceEntry> {
        self.devices.get(name)
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceEntry> {
        self.devices.values()
    }

    /// Binding answering `key` on `device`, with its slot
    pub fn lookup(&self, device: &str, key: u32) -> Option<(usize, &Binding)> {
        let entry = self.devices.get(device)?;
        let slot = entry.slot(key)?;
        entry.bindings.get(slot).map(|b| (slot, b))
    }

    /// Effective targets: the binding's override, else the defaults
    pub fn targets_for<'a>(&'a self, binding: &'a Binding) -> &'a [Target] {
        binding.targets.as_deref().unwrap_or(&self.defaults)
    }
}

/// Live state of one binding
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyState {
    pub value: Option<KeyValue>,
    pub value_raw: f32,
    pub updated_at: Option<DateTime<Local>>,
}

/// Mutable state of every binding, by (device, slot)
#[derive(Debug, Default)]
pub struct RuntimeState {
    keys: HashMap<(String, usize), KeyState>,
}

impl RuntimeState {
    pub fn get(&self, device: &str, slot: usize) -> Option<&KeyState> {
        self.keys.get(&(device.to_string(), slot))
    }

    pub fn entry(&mut self, device: &str, slot: usize) -> &mut KeyState {
        self.keys.entry((device.to_string(), slot)).or_default()
    }
}

