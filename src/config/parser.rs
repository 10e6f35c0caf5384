use thiserror::Error;

use crate::config::lexer::{Lexer, Token};
use crate::config::{AppConfig, LogLevel};

pub const REFRESH_INTERVAL: &str = "refresh_interval";
pub const MONITORED_SENSORS: &str = "monitored_sensors";
pub const PORT: &str = "port";
pub const MAX_CONNECTED_CLIENTS: &str = "max_connected_clients";
pub const LOG_LEVEL: &str = "log_level";
pub const LOG_TO_UDP_SOCKET: &str = "log_to_udp_socket";
pub const LOG_PORT: &str = "log_port";

/// Failure to turn configuration text into an [`AppConfig`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("line {line}: unknown token \"{token}\"")]
    UnknownToken { line: u32, token: char },

    #[error("line {line}: unterminated string")]
    UnterminatedString { line: u32 },

    #[error("line {line}: integer {digits} is too large")]
    IntegerTooLarge { line: u32, digits: String },

    #[error("line {line}: unexpected end of file, expected {expected}")]
    UnexpectedEnd { line: u32, expected: &'static str },

    #[error("line {line}: unexpected token \"{found}\", expected {expected}")]
    UnexpectedToken {
        line: u32,
        found: String,
        expected: &'static str,
    },

    #[error("line {line}: unknown configuration variable {name}")]
    UnknownOption { line: u32, name: String },

    #[error("line {line}: invalid {option} {value}, possible values are {min} - {max}")]
    OutOfRange {
        line: u32,
        option: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error(
        "line {line}: invalid log_level {value}, possible values are {}",
        LogLevel::NAMES.join("|")
    )]
    InvalidLogLevel { line: u32, value: String },

    #[error("missing option {0}")]
    MissingOption(&'static str),
}

impl ParseError {
    /// Line the error was detected on; `None` for options missing from the whole file.
    pub fn line(&self) -> Option<u32> {
        match self {
            ParseError::UnknownToken { line, .. }
            | ParseError::UnterminatedString { line }
            | ParseError::IntegerTooLarge { line, .. }
            | ParseError::UnexpectedEnd { line, .. }
            | ParseError::UnexpectedToken { line, .. }
            | ParseError::UnknownOption { line, .. }
            | ParseError::OutOfRange { line, .. }
            | ParseError::InvalidLogLevel { line, .. } => Some(*line),
            ParseError::MissingOption(_) => None,
        }
    }
}

#[derive(Default)]
struct PartialConfig {
    refresh_interval_ms: Option<u32>,
    monitored_sensors: Option<Vec<String>>,
    port: Option<u16>,
    max_connected_clients: Option<u16>,
    log_level: Option<LogLevel>,
    log_to_udp_socket: Option<bool>,
    log_port: Option<u16>,
}

impl PartialConfig {
    fn finish(self) -> Result<AppConfig, ParseError> {
        Ok(AppConfig {
            refresh_interval_ms: self
                .refresh_interval_ms
                .ok_or(ParseError::MissingOption(REFRESH_INTERVAL))?,
            monitored_sensors: self
                .monitored_sensors
                .ok_or(ParseError::MissingOption(MONITORED_SENSORS))?,
            port: self.port.ok_or(ParseError::MissingOption(PORT))?,
            max_connected_clients: self
                .max_connected_clients
                .ok_or(ParseError::MissingOption(MAX_CONNECTED_CLIENTS))?,
            log_level: self.log_level.ok_or(ParseError::MissingOption(LOG_LEVEL))?,
            log_to_udp_socket: self
                .log_to_udp_socket
                .ok_or(ParseError::MissingOption(LOG_TO_UDP_SOCKET))?,
            log_port: self.log_port.ok_or(ParseError::MissingOption(LOG_PORT))?,
        })
    }
}

/// Recursive-descent parser over `name = value` statements with one token of lookahead.
pub(crate) struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
        }
    }

    pub(crate) fn parse(mut self) -> Result<AppConfig, ParseError> {
        let mut config = PartialConfig::default();

        loop {
            let name = match self.lexer.next_token()? {
                Token::End => break,
                Token::Identifier(name) => name,
                other => return Err(self.unexpected(&other, "variable name")),
            };
            self.expect_assign()?;

            // A repeated option silently replaces the earlier value.
            match name.as_str() {
                REFRESH_INTERVAL => {
                    let value = self.expect_ranged(REFRESH_INTERVAL, 1, u32::MAX as u64)?;
                    config.refresh_interval_ms = Some(value as u32);
                }
                MONITORED_SENSORS => {
                    config.monitored_sensors = Some(self.parse_list()?);
                }
                PORT => {
                    config.port = Some(self.expect_port(PORT)?);
                }
                MAX_CONNECTED_CLIENTS => {
                    config.max_connected_clients = Some(self.expect_port(MAX_CONNECTED_CLIENTS)?);
                }
                LOG_LEVEL => {
                    config.log_level = Some(self.expect_log_level()?);
                }
                LOG_TO_UDP_SOCKET => {
                    config.log_to_udp_socket = Some(self.expect_bool()?);
                }
                LOG_PORT => {
                    config.log_port = Some(self.expect_port(LOG_PORT)?);
                }
                _ => {
                    return Err(ParseError::UnknownOption {
                        line: self.lexer.line(),
                        name,
                    })
                }
            }
        }

        config.finish()
    }

    fn unexpected(&self, found: &Token, expected: &'static str) -> ParseError {
        let line = self.lexer.line();
        match found {
            Token::End => ParseError::UnexpectedEnd { line, expected },
            other => ParseError::UnexpectedToken {
                line,
                found: other.describe(),
                expected,
            },
        }
    }

    fn expect_assign(&mut self) -> Result<(), ParseError> {
        match self.lexer.next_token()? {
            Token::Assign => Ok(()),
            other => Err(self.unexpected(&other, "=")),
        }
    }

    fn expect_integer(&mut self) -> Result<u64, ParseError> {
        match self.lexer.next_token()? {
            Token::Integer(value) => Ok(value),
            other => Err(self.unexpected(&other, "integer")),
        }
    }

    fn expect_ranged(
        &mut self,
        option: &'static str,
        min: u64,
        max: u64,
    ) -> Result<u64, ParseError> {
        let value = self.expect_integer()?;
        if !(min..=max).contains(&value) {
            return Err(ParseError::OutOfRange {
                line: self.lexer.line(),
                option,
                value,
                min,
                max,
            });
        }
        Ok(value)
    }

    fn expect_port(&mut self, option: &'static str) -> Result<u16, ParseError> {
        self.expect_ranged(option, 1, u16::MAX as u64)
            .map(|value| value as u16)
    }

    fn expect_bool(&mut self) -> Result<bool, ParseError> {
        match self.lexer.next_token()? {
            Token::Bool(value) => Ok(value),
            other => Err(self.unexpected(&other, "boolean")),
        }
    }

    fn expect_log_level(&mut self) -> Result<LogLevel, ParseError> {
        match self.lexer.next_token()? {
            Token::Identifier(name) => name.parse().map_err(|_| ParseError::InvalidLogLevel {
                line: self.lexer.line(),
                value: name,
            }),
            other => Err(self.unexpected(&other, "error|warning|info|debug")),
        }
    }

    fn parse_list(&mut self) -> Result<Vec<String>, ParseError> {
        match self.lexer.next_token()? {
            Token::OpenBracket => {}
            other => return Err(self.unexpected(&other, "[")),
        }

        let mut items = Vec::new();
        let mut token = self.lexer.next_token()?;
        if token == Token::CloseBracket {
            return Ok(items);
        }

        loop {
            match token {
                Token::Str(item) => items.push(item),
                other => return Err(self.unexpected(&other, "string")),
            }

            match self.lexer.next_token()? {
                Token::CloseBracket => return Ok(items),
                Token::Comma => token = self.lexer.next_token()?,
                other => return Err(self.unexpected(&other, "\",\" or \"]\"")),
            }
        }
    }
}
