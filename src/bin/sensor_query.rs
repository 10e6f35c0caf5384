//! Reads sensors from a running hwmon-service once and prints the results.
//!
//! Usage: `sensor-query <host[:port]> <sensor>...`

use anyhow::{bail, Context};
use env_logger::{Builder, WriteStyle};
use hwmonsvc::client::{ClientError, SensorClient};
use log::LevelFilter;

fn main() -> anyhow::Result<()> {
    Builder::new()
        .filter_level(LevelFilter::Warn)
        .write_style(WriteStyle::Always)
        .format_timestamp_secs()
        .init();

    let mut args = std::env::args().skip(1);
    let Some(target) = args.next() else {
        bail!("usage: sensor-query <host[:port]> <sensor>...");
    };
    let sensors: Vec<String> = args.collect();
    if sensors.is_empty() {
        bail!("no sensor given; usage: sensor-query <host[:port]> <sensor>...");
    }

    let mut client =
        SensorClient::connect_to(&target).context(format!("Failed to connect to {}", target))?;

    let mut failed = 0;
    for sensor in &sensors {
        match client.read_value(sensor) {
            Ok(value) => println!("{}: {:.2}", sensor, value),
            Err(ClientError::Sensor(code)) => {
                println!("{}: {:?}", sensor, code);
                failed += 1;
            }
            Err(e) => return Err(e).context(format!("Request for {} failed", sensor)),
        }
    }

    if failed > 0 {
        bail!("{} of {} sensors could not be read", failed, sensors.len());
    }
    Ok(())
}
