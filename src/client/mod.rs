pub mod sensor_client;

pub use sensor_client::{ClientError, SensorClient, DEFAULT_PORT, DEFAULT_TIMEOUT};
