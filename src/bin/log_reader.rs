//! Prints log lines received on the local UDP log port.
//!
//! Usage: `log-reader [port] [app]`; with `app` given, only lines tagged `[app]` are shown.

use anyhow::{bail, Context};
use hwmonsvc::logging::{is_from_app, DEFAULT_LOG_PORT};
use std::net::{Ipv4Addr, UdpSocket};

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let port = match args.next() {
        Some(arg) => match arg.parse::<u16>() {
            Ok(port) => port,
            Err(_) => bail!("invalid port \"{}\", number expected", arg),
        },
        None => DEFAULT_LOG_PORT,
    };
    let app = args.next();

    let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, port))
        .context(format!("Failed to open logging socket on port {}", port))?;
    println!("Listening to log messages at UDP port {}", port);
    if let Some(app) = &app {
        println!("Showing only messages from {}", app);
    }

    let mut buf = [0u8; 1024];
    loop {
        let n = match socket.recv(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                eprintln!("Failed to receive log message: {}", e);
                continue;
            }
        };
        let line = String::from_utf8_lossy(&buf[..n]);
        let line = line.trim_end();
        if app.as_deref().map_or(true, |app| is_from_app(line, app)) {
            println!("{}", line);
        }
    }
}
