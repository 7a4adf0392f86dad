//! Map step: record the raw input and compute the binding's new value

use chrono::Local;
use tracing::trace;

use super::store::Binding;
use crate::mapping::map_value;

impl super::Router {
    /// Map `raw` into `binding`'s state, then route it.
    ///
    /// `value_raw` is always recorded; a toggle release stops here without
    /// routing.
    pub(crate) fn map(
        &mut self,
        binding: &Binding,
        slot: usize,
        device: &str,
        key: u32,
        raw: f32,
    ) -> bool {
        let state = self.state.entry(device, slot);
        state.value_raw = raw;
        state.updated_at = Some(Local::now());

        let Some(value) = map_value(binding.data_type, &binding.points, raw, state.value.as_ref())
        else {
            trace!("'{}' ignores release", binding.name);
            return false;
        };

        trace!("'{}' ({}) = {}", binding.name, binding.data_type, value);
        state.value = Some(value);

        self.route(binding, slot, device, key)
    }
}
