//! Configuration management for Surface GW
//!
//! Handles loading, validating, saving and hot-reloading of YAML configuration
//! files. The configuration is immutable once loaded; live key state is kept
//! by the router in its own runtime table.

pub mod watcher;

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio::fs;
use tracing::warn;

use crate::mapping::DataType;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Script globals, exposed to every shape function as `global`
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub global: serde_json::Value,
    /// Default output targets, in broadcast order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out: Option<OneOrMany<String>>,
    /// Input devices by (partial) port name
    #[serde(rename = "in", default, skip_serializing_if = "IndexMap::is_empty")]
    pub inputs: IndexMap<String, DeviceBindings>,
    /// Synthetic timer devices
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pulse: Vec<PulseConfig>,
}

/// A scalar or a sequence of scalars (`key: 36` or `key: [36, 37]`)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item.clone()],
            OneOrMany::Many(items) => items.clone(),
        }
    }
}

/// Bindings of one input device: a sequence, or a table keyed by key number
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DeviceBindings {
    List(Vec<BindingConfig>),
    Keyed(IndexMap<TableKey, BindingConfig>),
}

/// Key of a keyed binding table: `36:` or `"36":`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TableKey {
    Number(u32),
    Text(String),
}

impl TableKey {
    pub fn key(&self) -> Result<u32> {
        match self {
            TableKey::Number(key) => Ok(*key),
            TableKey::Text(text) => text
                .trim()
                .parse::<u32>()
                .with_context(|| format!("Invalid key '{}' in keyed bindings", text)),
        }
    }
}

impl DeviceBindings {
    /// Resolve every binding with the raw keys it responds to.
    ///
    /// Sequence entries without `key` respond to their own index.
    pub fn entries(&self) -> Result<Vec<(Vec<u32>, &BindingConfig)>> {
        match self {
            DeviceBindings::List(list) => Ok(list
                .iter()
                .enumerate()
                .map(|(idx, binding)| {
                    let keys = match &binding.key {
                        Some(keys) => keys.to_vec(),
                        None => vec![idx as u32],
                    };
                    (keys, binding)
                })
                .collect()),
            DeviceBindings::Keyed(table) => table
                .iter()
                .map(|(key, binding)| Ok((vec![key.key()?], binding)))
                .collect(),
        }
    }
}

/// One logical control
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BindingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<OneOrMany<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Shape script source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<ControlMap>,
    /// Target override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out: Option<OneOrMany<String>>,
}

/// Control points: a sequence for interpolation / lookup, or a table keyed by
/// state (`on` / `off`) for buttons and toggles
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ControlMap {
    Points(Vec<serde_json::Value>),
    States(IndexMap<String, serde_json::Value>),
}

/// Synthetic device firing on a timer
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PulseConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    /// Period in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<f64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<ControlMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out: Option<OneOrMany<String>>,
}

impl PulseConfig {
    /// Firing period derived from whichever of `bpm`, `fps`, `interval` is set
    pub fn period(&self) -> Result<Duration> {
        let millis = match (self.bpm, self.fps, self.interval) {
            (Some(bpm), None, None) => 60_000.0 / bpm,
            (None, Some(fps), None) => 1_000.0 / fps,
            (None, None, Some(interval)) => interval,
            (None, None, None) => bail!("Pulse '{}' needs one of bpm, fps or interval", self.name),
            _ => bail!("Pulse '{}' must set only one of bpm, fps or interval", self.name),
        };

        if !millis.is_finite() || millis <= 0.0 {
            bail!("Pulse '{}' has an invalid period ({} ms)", self.name, millis);
        }

        Ok(Duration::from_secs_f64(millis / 1_000.0))
    }

    /// The synthetic binding answering key 0 of this pulse
    pub fn binding(&self) -> BindingConfig {
        BindingConfig {
            key: Some(OneOrMany::One(0)),
            name: Some(self.name.clone()),
            type_name: self.type_name.clone(),
            shape: self.shape.clone(),
            map: self.map.clone(),
            out: self.out.clone(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_yaml(&contents).with_context(|| format!("Invalid config file: {}", path))
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Default output target addresses, in order
    pub fn default_targets(&self) -> Vec<String> {
        self.out.as_ref().map(OneOrMany::to_vec).unwrap_or_default()
    }

    /// Validate configuration for correctness and consistency
    ///
    /// Hard errors abort the load; suspicious but usable entries (unknown
    /// types, duplicated keys) are only reported.
    pub fn validate(&self) -> Result<()> {
        let mut device_names = HashSet::new();

        for (device, bindings) in &self.inputs {
            if device.trim().is_empty() {
                bail!("Input device name cannot be empty");
            }
            device_names.insert(device.as_str());

            let entries = bindings
                .entries()
                .with_context(|| format!("Invalid bindings for device '{}'", device))?;

            let mut seen_keys = HashSet::new();
            for (idx, (keys, binding)) in entries.iter().enumerate() {
                warn_on_unknown_type(device, idx, binding.type_name.as_deref());

                for key in keys {
                    if !seen_keys.insert(*key) {
                        warn!(
                            "Device '{}' binds key {} more than once, the last binding wins",
                            device, key
                        );
                    }
                }
            }
        }

        for pulse in &self.pulse {
            if pulse.name.trim().is_empty() {
                bail!("Pulse name cannot be empty");
            }
            if !device_names.insert(pulse.name.as_str()) {
                bail!("Pulse '{}' clashes with another device name", pulse.name);
            }
            pulse.period()?;
            warn_on_unknown_type(&pulse.name, 0, pulse.type_name.as_deref());
        }

        Ok(())
    }
}

fn warn_on_unknown_type(device: &str, idx: usize, type_name: Option<&str>) {
    if let Some(name) = type_name {
        if DataType::from_name(name).is_none() {
            warn!(
                "Device '{}' binding #{} has unknown type '{}', treating it as a number",
                device, idx, name
            );
        }
    }
}
