use std::sync::atomic::{AtomicU32, Ordering};

/// How a sensor identifier relates to the hardware and the configured monitor list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorState {
    /// Reported by the hardware and listed in `monitored_sensors`.
    Monitored,
    /// Listed in `monitored_sensors` but not reported by the hardware.
    RequestedButNotFound,
    /// Reported by the hardware but not listed in `monitored_sensors`.
    FoundButNotMonitored,
}

/// One row of the sensor table. The value is stored as raw `f32` bits so a
/// reader always sees a whole value written by the poller.
#[derive(Debug)]
pub struct SensorEntry {
    state: SensorState,
    value: AtomicU32,
}

impl SensorEntry {
    pub fn new(state: SensorState) -> Self {
        Self {
            state,
            value: AtomicU32::new(0f32.to_bits()),
        }
    }

    pub fn state(&self) -> SensorState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SensorState) {
        self.state = state;
    }

    /// Last stored reading; zero or less means no successful reading yet.
    pub fn value(&self) -> f32 {
        f32::from_bits(self.value.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, value: f32) {
        self.value.store(value.to_bits(), Ordering::Release);
    }

    pub fn has_reading(&self) -> bool {
        self.value() > 0.0
    }
}
