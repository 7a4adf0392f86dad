//! Router module - the key mapping and broadcast pipeline
//!
//! For every incoming `(device, key, raw value)` the router runs, in order:
//! - binding lookup in the [`BindingStore`]
//! - the binding's shape script, if any
//! - type-directed mapping into a [`KeyValue`](crate::mapping::KeyValue)
//! - broadcast to the effective targets
//! - post-routing hooks (LED feedback)
//!
//! Every step reports success as a plain `bool`; nothing here aborts.

mod feedback;
mod mapper;
mod route;
mod shaper;
pub mod store;

pub use feedback::{FeedbackController, RouteHook, StateRouted};
pub use store::{Binding, BindingStore, DeviceEntry, DeviceKind, KeyState, RuntimeState};


use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::AppConfig;
use crate::devices::MidiSink;
use crate::drivers::Broadcaster;
use crate::shaper::Evaluator;

/// Pipeline owner: immutable bindings, live key state and the collaborators
pub struct Router {
    /// Shared so a binding can stay borrowed across `&mut self` calls
    pub(crate) store: Arc<BindingStore>,
    pub(crate) state: RuntimeState,
    pub(crate) evaluator: Box<dyn Evaluator>,
    pub(crate) outlets: Box<dyn Broadcaster>,
    pub(crate) midi: Arc<dyn MidiSink>,
    pub(crate) feedback: FeedbackController,
    pub(crate) hooks: Vec<Box<dyn RouteHook>>,
}

impl Router {
    /// Build the pipeline for `config`, registering its shapes with `evaluator`
    pub fn new(
        config: &AppConfig,
        mut evaluator: Box<dyn Evaluator>,
        outlets: Box<dyn Broadcaster>,
        midi: Arc<dyn MidiSink>,
    ) -> Result<Self> {
        let store = BindingStore::from_config(config, evaluator.as_mut())?;
        let feedback = FeedbackController::new(Arc::clone(&midi));

        Ok(Self {
            store: Arc::new(store),
            state: RuntimeState::default(),
            evaluator,
            outlets,
            midi,
            hooks: vec![Box::new(feedback.clone())],
            feedback,
        })
    }

    /// Register an extra post-routing hook
    pub fn add_hook(&mut self, hook: Box<dyn RouteHook>) {
        self.hooks.push(hook);
    }

    pub fn store(&self) -> &BindingStore {
        &self.store
    }

    /// Binding name and live state for `key` on `device`
    pub fn key_state(&self, device: &str, key: u32) -> Option<(String, KeyState)> {
        let (slot, binding) = self.store.lookup(device, key)?;
        let state = self.state.get(device, slot).cloned().unwrap_or_default();
        Some((binding.name.clone(), state))
    }

    /// Run one input event through the pipeline
    pub fn handle_event(&mut self, device: &str, key: u32, raw: f32) -> bool {
        let store = Arc::clone(&self.store);
        let Some((slot, binding)) = store.lookup(device, key) else {
            debug!("No binding for key {} on '{}'", key, device);
            return false;
        };

        trace!("{}[{}] = {} → '{}'", device, key, raw, binding.name);

        match self.shape(binding, slot, device, key, raw) {
            shaper::ShapeOutcome::Continue(raw) => self.map(binding, slot, device, key, raw),
            shaper::ShapeOutcome::Done(success) => success,
        }
    }
}
