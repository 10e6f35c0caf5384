use indexmap::IndexMap;
use log::debug;
use std::time::Instant;
use sysinfo::Components;

use crate::collectors::{checked_reading, insert_unique, SensorError, SensorSource};

/// Temperature sensors exposed through `sysinfo` components, keyed by label.
///
/// Components sharing a label get a ` #2`, ` #3`... suffix in list order.
pub struct ComponentSource {
    components: Components,
    ids: IndexMap<String, usize>,
}

impl ComponentSource {
    pub fn new() -> Self {
        let components = Components::new_with_refreshed_list();
        let ids = component_ids(components.list().iter().map(|component| component.label()));
        Self { components, ids }
    }
}

impl Default for ComponentSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps each unique identifier to the component's position in the list.
fn component_ids<'a>(labels: impl Iterator<Item = &'a str>) -> IndexMap<String, usize> {
    let mut ids = IndexMap::new();
    for (idx, label) in labels.enumerate() {
        insert_unique(&mut ids, label.to_string(), idx);
    }
    ids
}

impl SensorSource for ComponentSource {
    fn name(&self) -> &'static str {
        "sysinfo"
    }

    fn sensors(&mut self) -> Result<Vec<String>, SensorError> {
        Ok(self.ids.keys().cloned().collect())
    }

    fn read(&mut self, id: &str) -> Result<f32, SensorError> {
        let start = Instant::now();
        let component = self
            .ids
            .get(id)
            .and_then(|&idx| self.components.list_mut().get_mut(idx))
            .ok_or_else(|| SensorError::NotFound(id.to_string()))?;

        component.refresh();
        let value = component.temperature().unwrap_or(0.0);
        debug!("read {} took: {} us", id, start.elapsed().as_micros());
        checked_reading(id, value)
    }
}
