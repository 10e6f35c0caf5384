pub mod sensor;
pub mod table;

pub use sensor::{SensorEntry, SensorState};
pub use table::SensorTable;
