//! Prints every sensor the detected sensor source reports, with a current reading.

use anyhow::Context;
use env_logger::{Builder, WriteStyle};
use hwmonsvc::collectors::detect_source;
use log::LevelFilter;

fn main() -> anyhow::Result<()> {
    Builder::new()
        .filter_level(LevelFilter::Warn)
        .write_style(WriteStyle::Always)
        .format_timestamp_secs()
        .init();

    let mut source = detect_source().context("Failed to initialize sensor monitoring")?;
    let sensors = source.sensors().context("Failed to enumerate sensors")?;

    println!("{} sensors from {}:", sensors.len(), source.name());
    for id in sensors {
        match source.read(&id) {
            Ok(value) => println!("  {:<40} {:>7.1} °C", id, value),
            Err(e) => println!("  {:<40} {:>7} ({})", id, "-", e),
        }
    }
    Ok(())
}
