use indexmap::IndexMap;
use log::{debug, error};

use crate::models::sensor::{SensorEntry, SensorState};

/// Map from sensor identifier to its classification and latest value.
///
/// The key set is fixed when the table is built. Afterwards only entry values
/// change, so the table is shared behind an `Arc` with no lock: the poller
/// writes values, session handlers read them.
#[derive(Debug, Default)]
pub struct SensorTable {
    entries: IndexMap<String, SensorEntry>,
}

impl SensorTable {
    /// Merges hardware-reported identifiers with the configured monitor list.
    ///
    /// Hardware sensors start as [`SensorState::FoundButNotMonitored`]; those
    /// also listed in `monitored` become [`SensorState::Monitored`]. Listed
    /// sensors the hardware does not report are kept as
    /// [`SensorState::RequestedButNotFound`] and logged.
    pub fn build<I, S>(hardware: I, monitored: &[String]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries = IndexMap::new();
        for id in hardware {
            entries
                .entry(id.into())
                .or_insert_with(|| SensorEntry::new(SensorState::FoundButNotMonitored));
        }

        for id in monitored {
            match entries.get_mut(id) {
                // Repeats of a missing sensor stay RequestedButNotFound.
                Some(entry) => {
                    if entry.state() == SensorState::FoundButNotMonitored {
                        debug!("Monitoring sensor {}", id);
                        entry.set_state(SensorState::Monitored);
                    }
                }
                None => {
                    error!("Requested sensor {} not found", id);
                    entries.insert(id.clone(), SensorEntry::new(SensorState::RequestedButNotFound));
                }
            }
        }

        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&SensorEntry> {
        self.entries.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SensorEntry)> {
        self.entries.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    pub fn monitored(&self) -> impl Iterator<Item = (&str, &SensorEntry)> {
        self.iter()
            .filter(|(_, entry)| entry.state() == SensorState::Monitored)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
