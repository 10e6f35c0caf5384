use chrono::{DateTime, Local};
use env_logger::{Builder, Target, WriteStyle};
use log::{warn, Level};
use std::fmt::Display;
use std::io::{self, Write};
use std::net::{Ipv4Addr, UdpSocket};

use crate::config::AppConfig;

/// Prefix of every line sent to the UDP log sink.
pub const LOG_TAG: &str = "[hwmon-service]";

/// Port the log reader listens on when none is given.
pub const DEFAULT_LOG_PORT: u16 = 28524;

/// Log target sending each record as one datagram to a local port.
pub struct UdpLogSink {
    socket: UdpSocket,
}

impl UdpLogSink {
    pub fn connect(port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))?;
        socket.connect((Ipv4Addr::LOCALHOST, port))?;
        Ok(Self { socket })
    }
}

impl Write for UdpLogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.socket.send(buf) {
            Ok(_) => Ok(buf.len()),
            // Nobody listening right now; the record is dropped.
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => Ok(buf.len()),
            Err(e) => Err(e),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn severity(level: Level) -> &'static str {
    match level {
        Level::Error => "Error",
        Level::Warn => "Warning",
        Level::Info => "Info",
        Level::Debug | Level::Trace => "Debug",
    }
}

/// `[hwmon-service] YYYY-MM-DD HH:MM:SS [Severity] message`
pub fn format_line(time: &DateTime<Local>, level: Level, message: impl Display) -> String {
    format!(
        "{} {} [{}] {}",
        LOG_TAG,
        time.format("%Y-%m-%d %H:%M:%S"),
        severity(level),
        message
    )
}

/// True when `line` was sent by the application named `app`.
pub fn is_from_app(line: &str, app: &str) -> bool {
    line.strip_prefix('[')
        .and_then(|rest| rest.strip_prefix(app))
        .is_some_and(|rest| rest.starts_with(']'))
}

/// Installs the global logger described by `config`.
///
/// Console output is the default. With `log_to_udp_socket` set, records go to
/// `127.0.0.1:log_port` instead; if that socket cannot be opened the console
/// is kept and the failure is logged once.
pub fn init_logging(config: &AppConfig) {
    let mut builder = Builder::new();
    builder.filter_level(config.get_log_level());

    let mut udp_error = None;
    if config.log_to_udp_socket {
        match UdpLogSink::connect(config.log_port) {
            Ok(sink) => {
                builder
                    .write_style(WriteStyle::Never)
                    .format(|buf, record| {
                        let line = format_line(&Local::now(), record.level(), record.args());
                        writeln!(buf, "{}", line)
                    })
                    .target(Target::Pipe(Box::new(sink)));
            }
            Err(e) => udp_error = Some(e),
        }
    }

    if !config.log_to_udp_socket || udp_error.is_some() {
        builder.write_style(WriteStyle::Always).format_timestamp_secs();
    }
    builder.init();

    if let Some(e) = udp_error {
        warn!(
            "Failed to open UDP log socket for port {}, logging to console: {}",
            config.log_port, e
        );
    }
}
