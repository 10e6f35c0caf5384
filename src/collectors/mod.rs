use indexmap::IndexMap;
use log::{debug, info, warn};
use std::io;
use thiserror::Error;

pub mod components;
pub mod hwmon;
pub mod poller;

pub use components::ComponentSource;
pub use hwmon::HwmonSource;
pub use poller::SensorPoller;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor {0} is not known to the sensor source")]
    NotFound(String),

    #[error("sensor {id} reported an unusable value {value}")]
    Unreadable { id: String, value: f32 },

    #[error("failed to read sensor {id}: {source}")]
    Io {
        id: String,
        #[source]
        source: io::Error,
    },

    #[error("no hardware sensors were found")]
    NoSensors,
}

/// Hardware facility the service samples from.
pub trait SensorSource: Send {
    /// Short name used in log messages.
    fn name(&self) -> &'static str;

    /// Identifiers of every sensor the hardware currently reports.
    fn sensors(&mut self) -> Result<Vec<String>, SensorError>;

    /// Fresh reading of one sensor. Values of zero or less are reported as
    /// [`SensorError::Unreadable`], never as a reading.
    fn read(&mut self, id: &str) -> Result<f32, SensorError>;
}

/// Rejects the non-positive values hardware back-ends use to signal failure.
pub(crate) fn checked_reading(id: &str, value: f32) -> Result<f32, SensorError> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(SensorError::Unreadable {
            id: id.to_string(),
            value,
        })
    }
}

/// Inserts `value` under `id`, or under `id #2`, `id #3`... when `id` is taken.
/// Returns the identifier actually used.
pub(crate) fn insert_unique<V>(map: &mut IndexMap<String, V>, id: String, value: V) -> String {
    if !map.contains_key(&id) {
        map.insert(id.clone(), value);
        return id;
    }

    let mut n = 2;
    let mut unique = format!("{} #{}", id, n);
    while map.contains_key(&unique) {
        n += 1;
        unique = format!("{} #{}", id, n);
    }
    warn!("Sensor {} is reported more than once, registering it as {}", id, unique);
    map.insert(unique.clone(), value);
    unique
}

/// Picks the first sensor source that reports at least one sensor.
pub fn detect_source() -> Result<Box<dyn SensorSource>, SensorError> {
    let mut candidates: Vec<Box<dyn SensorSource>> = vec![
        Box::new(ComponentSource::new()),
        Box::new(HwmonSource::new(hwmon::DEFAULT_HWMON_ROOT)),
    ];

    for mut source in candidates.drain(..) {
        match source.sensors() {
            Ok(sensors) if !sensors.is_empty() => {
                info!("Using {} sensor source with {} sensors", source.name(), sensors.len());
                return Ok(source);
            }
            Ok(_) => debug!("{} sensor source reports no sensors", source.name()),
            Err(e) => warn!("{} sensor source unavailable: {}", source.name(), e),
        }
    }

    Err(SensorError::NoSensors)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// In-memory source whose readings tests can change while it is in use.
    #[derive(Clone, Default)]
    pub(crate) struct StaticSource {
        readings: Arc<Mutex<IndexMap<String, f32>>>,
    }

    impl StaticSource {
        pub(crate) fn new(readings: &[(&str, f32)]) -> Self {
            let source = Self::default();
            for (id, value) in readings {
                source.set(id, *value);
            }
            source
        }

        pub(crate) fn set(&self, id: &str, value: f32) {
            self.readings.lock().unwrap().insert(id.to_string(), value);
        }
    }

    impl SensorSource for StaticSource {
        fn name(&self) -> &'static str {
            "static"
        }

        fn sensors(&mut self) -> Result<Vec<String>, SensorError> {
            Ok(self.readings.lock().unwrap().keys().cloned().collect())
        }

        fn read(&mut self, id: &str) -> Result<f32, SensorError> {
            let value = self
                .readings
                .lock()
                .unwrap()
                .get(id)
                .copied()
                .ok_or_else(|| SensorError::NotFound(id.to_string()))?;
            checked_reading(id, value)
        }
    }
}
