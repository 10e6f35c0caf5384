use anyhow::{Context, Result};
use log::{debug, LevelFilter};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::utils::file::executable_dir;

mod lexer;
mod parser;

pub use parser::ParseError;

/// File name looked up next to the running executable.
pub const DEFAULT_CONFIG_FILE: &str = "settings.txt";

/// Verbosity levels accepted by `log_level`, least verbose first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    pub const NAMES: [&'static str; 4] = ["error", "warning", "info", "debug"];

    pub fn as_str(self) -> &'static str {
        Self::NAMES[self as usize]
    }

    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(LogLevel::Error),
            "warning" => Ok(LogLevel::Warning),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            _ => Err(()),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operating parameters of the service. Every field must be present in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub refresh_interval_ms: u32,
    pub monitored_sensors: Vec<String>,
    pub port: u16,
    pub max_connected_clients: u16,
    pub log_level: LogLevel,
    pub log_to_udp_socket: bool,
    pub log_port: u16,
}

impl AppConfig {
    /// Loads [`DEFAULT_CONFIG_FILE`] from the directory of the running executable.
    pub fn new() -> Result<Self> {
        let dir = executable_dir().context("Failed to get executable path")?;
        Self::from_file(dir.join(DEFAULT_CONFIG_FILE))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();
        debug!("Loading configuration from {}", config_path.display());

        let source = fs::read_to_string(config_path)
            .context(format!("Failed to open config file {}", config_path.display()))?;

        let app_config = Self::parse(&source)
            .context(format!("Failed to load config file {}", config_path.display()))?;

        Ok(app_config)
    }

    pub fn parse(source: &str) -> Result<Self, ParseError> {
        parser::Parser::new(source).parse()
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms as u64)
    }

    pub fn get_log_level(&self) -> LevelFilter {
        self.log_level.to_level_filter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SETTINGS: &str = r#"
refresh_interval = 1000
monitored_sensors = [
    "k10temp Tctl",
    "amdgpu edge"
]
port = 17748
max_connected_clients = 8
log_level = info
log_to_udp_socket = false
log_port = 28524
"#;

    #[test]
    fn test_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(SETTINGS.as_bytes()).unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();

        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
        assert_eq!(config.monitored_sensors, vec!["k10temp Tctl", "amdgpu edge"]);
        assert_eq!(config.port, 17748);
        assert_eq!(config.max_connected_clients, 8);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.get_log_level(), LevelFilter::Info);
        assert!(!config.log_to_udp_socket);
        assert_eq!(config.log_port, 28524);
    }

    #[test]
    fn test_from_file_reports_path_and_line() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"refresh_interval = 10\nport = 70000\n").unwrap();

        let err = AppConfig::from_file(temp_file.path()).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains(&temp_file.path().display().to_string()));
        assert!(message.contains("line 2: invalid port 70000"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::from_file(dir.path().join(DEFAULT_CONFIG_FILE)).unwrap_err();
        assert!(err.to_string().starts_with("Failed to open config file"));
    }

    #[test]
    fn test_log_levels_are_ordered() {
        assert!(LogLevel::Error < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        for name in LogLevel::NAMES {
            assert_eq!(name.parse::<LogLevel>().unwrap().as_str(), name);
        }
        assert_eq!(LogLevel::Warning.to_level_filter(), LevelFilter::Warn);
    }
}
