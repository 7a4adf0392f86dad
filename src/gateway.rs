//! Gateway runtime
//!
//! Devices deliver events from their own threads and timers into one
//! unbounded queue. A single worker thread drains it and owns the router, so
//! key state and the script engine are only ever touched from that thread.

use anyhow::{anyhow, Context, Result};
use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace};

use crate::config::AppConfig;
use crate::devices::{DeviceRegistry, EventCallback, InputEvent, MidiPorts};
use crate::drivers::Outlets;
use crate::router::{KeyState, Router};
use crate::shaper::JsEvaluator;

/// Messages understood by the pipeline worker
pub enum EngineMsg {
    Event(InputEvent),
    Query {
        device: String,
        key: u32,
        reply: Sender<Option<(String, KeyState)>>,
    },
    Reload {
        config: Box<AppConfig>,
        reply: Sender<Result<()>>,
    },
    Shutdown,
}

pub struct Gateway {
    tx: Sender<EngineMsg>,
    worker: Option<JoinHandle<()>>,
    registry: DeviceRegistry,
    ports: MidiPorts,
    config: AppConfig,
}

impl Gateway {
    /// Build the pipeline and open every configured device
    pub fn start(config: AppConfig) -> Result<Self> {
        let ports = MidiPorts::new();
        let (tx, rx) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);

        let worker_config = config.clone();
        let worker_ports = ports.clone();
        let worker = thread::Builder::new()
            .name("pipeline".to_string())
            .spawn(move || run_worker(worker_config, worker_ports, rx, ready_tx))
            .context("Failed to spawn pipeline worker")?;

        ready_rx
            .recv()
            .context("Pipeline worker exited during startup")??;

        let mut registry = DeviceRegistry::from_config(&config, ports.clone())?;
        registry.open_all(event_callback(&tx));

        info!("✅ Gateway running with {} devices", registry.len());

        Ok(Self {
            tx,
            worker: Some(worker),
            registry,
            ports,
            config,
        })
    }

    /// Swap in a new configuration.
    ///
    /// The new pipeline is built first; if that fails the running one and
    /// its devices are left untouched.
    pub fn reload(&mut self, config: AppConfig) -> Result<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(EngineMsg::Reload {
            config: Box::new(config.clone()),
            reply: reply_tx,
        })?;
        reply_rx
            .recv()
            .context("Pipeline worker stopped during reload")?
            .context("New configuration rejected")?;

        self.registry.stop_all();
        let mut registry = DeviceRegistry::from_config(&config, self.ports.clone())?;
        registry.open_all(event_callback(&self.tx));

        self.registry = registry;
        self.config = config;
        info!("🔄 Gateway reloaded");
        Ok(())
    }

    /// Queue an event as if a device had sent it
    pub fn inject(&self, device: &str, key: u32, value: f32) -> Result<()> {
        self.send(EngineMsg::Event(InputEvent {
            device: device.to_string(),
            key,
            value,
        }))
    }

    /// Binding name and live state of a key
    pub fn query(&self, device: &str, key: u32) -> Result<Option<(String, KeyState)>> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(EngineMsg::Query {
            device: device.to_string(),
            key,
            reply: reply_tx,
        })?;
        reply_rx
            .recv()
            .context("Pipeline worker stopped before answering")
    }

    pub fn describe_devices(&self) -> Vec<String> {
        self.registry.describe()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn send(&self, msg: EngineMsg) -> Result<()> {
        self.tx
            .send(msg)
            .map_err(|_| anyhow!("Pipeline worker is not running"))
    }

    /// Close devices, then stop the worker after it drains queued events
    pub fn shutdown(&mut self) {
        self.registry.stop_all();
        if let Some(worker) = self.worker.take() {
            let _ = self.tx.send(EngineMsg::Shutdown);
            if worker.join().is_err() {
                error!("Pipeline worker panicked");
            }
            debug!("Pipeline worker stopped");
        }
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn event_callback(tx: &Sender<EngineMsg>) -> EventCallback {
    let tx = tx.clone();
    Arc::new(move |event| {
        // Fails only once the worker is gone
        let _ = tx.send(EngineMsg::Event(event));
    })
}

fn build_router(config: &AppConfig, ports: &MidiPorts) -> Result<Router> {
    let evaluator = JsEvaluator::new(&config.global)?;
    Router::new(
        config,
        Box::new(evaluator),
        Box::new(Outlets::new()),
        Arc::new(ports.clone()),
    )
}

fn run_worker(
    config: AppConfig,
    ports: MidiPorts,
    rx: Receiver<EngineMsg>,
    ready: Sender<Result<()>>,
) {
    let mut router = match build_router(&config, &ports) {
        Ok(router) => {
            let _ = ready.send(Ok(()));
            router
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    drop(config);

    for msg in rx.iter() {
        match msg {
            EngineMsg::Event(event) => {
                let routed = router.handle_event(&event.device, event.key, event.value);
                trace!("{}[{}] handled: {}", event.device, event.key, routed);
            }
            EngineMsg::Query { device, key, reply } => {
                let _ = reply.send(router.key_state(&device, key));
            }
            EngineMsg::Reload { config, reply } => match build_router(&config, &ports) {
                Ok(new_router) => {
                    router = new_router;
                    let _ = reply.send(Ok(()));
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            EngineMsg::Shutdown => break,
        }
    }
}
