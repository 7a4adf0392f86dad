//! Pulse devices - synthetic inputs firing on a timer

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use super::{Device, EventCallback, InputEvent, MidiPorts};
use crate::router::DeviceKind;

/// Raw values cycle through one MIDI data byte
const TICK_WRAP: u32 = 128;

/// Emits key `0` every period with a wrapping tick counter as value
pub struct PulseDevice {
    name: String,
    period: Duration,
    ticks: Arc<AtomicU32>,
    task: Option<JoinHandle<()>>,
}

impl PulseDevice {
    pub fn new(name: &str, period: Duration) -> Self {
        Self {
            name: name.to_string(),
            period,
            ticks: Arc::new(AtomicU32::new(0)),
            task: None,
        }
    }
}

impl Device for PulseDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Pulse
    }

    fn open_input(&mut self, events: EventCallback) -> Result<()> {
        self.stop();

        let runtime = tokio::runtime::Handle::try_current()
            .context("Pulse devices need a running tokio runtime")?;

        let name = self.name.clone();
        let period = self.period;
        let ticks = Arc::clone(&self.ticks);

        self.task = Some(runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                let tick = ticks
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |t| {
                        Some((t + 1) % TICK_WRAP)
                    })
                    .unwrap_or(0);
                trace!("Pulse '{}' tick {}", name, tick);
                events(InputEvent {
                    device: name.clone(),
                    key: 0,
                    value: tick as f32,
                });
            }
        }));

        debug!("Pulse '{}' every {:?}", self.name, self.period);
        Ok(())
    }

    fn open_output(&mut self, _ports: &MidiPorts) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn is_open(&self) -> bool {
        self.task.is_some()
    }
}
