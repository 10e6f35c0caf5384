use log::debug;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;

use crate::protocol::{ProtocolError, ResponseCode, SensorRequest, SensorResponse};

pub const DEFAULT_PORT: u16 = 17748;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Address resolved to nothing")]
    NoAddress,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Sensor request failed: {0:?}")]
    Sensor(ResponseCode),
}

/// Blocking client holding one connection to the service.
///
/// Requests are strictly sequential: each call writes one request and waits
/// for its response before returning.
pub struct SensorClient {
    stream: TcpStream,
    peer: SocketAddr,
}

impl SensorClient {
    /// Connects to `addr`, trying every resolved address in turn.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ClientError> {
        let mut last_error = None;
        for peer in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&peer, DEFAULT_TIMEOUT) {
                Ok(stream) => {
                    debug!("Connected to {}", peer);
                    let mut client = Self { stream, peer };
                    client.set_timeout(DEFAULT_TIMEOUT)?;
                    return Ok(client);
                }
                Err(e) => {
                    debug!("Connecting to {} failed: {}", peer, e);
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => ClientError::Io(e),
            None => ClientError::NoAddress,
        })
    }

    /// Same as [`SensorClient::connect`], with [`DEFAULT_PORT`] when `target` names none.
    pub fn connect_to(target: &str) -> Result<Self, ClientError> {
        if target.parse::<SocketAddr>().is_ok() || has_port(target) {
            Self::connect(target)
        } else {
            Self::connect((target, DEFAULT_PORT))
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Applies `timeout` to both reads and writes.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<(), ClientError> {
        self.stream.set_read_timeout(Some(timeout))?;
        self.stream.set_write_timeout(Some(timeout))?;
        Ok(())
    }

    /// Sends one request and returns whatever the service answered.
    pub fn request(&mut self, sensor_id: &str) -> Result<SensorResponse, ClientError> {
        let request = SensorRequest::new(sensor_id).encode()?;
        self.stream.write_all(&request)?;

        let mut header = [0u8; SensorResponse::HEADER_LEN];
        self.stream.read_exact(&mut header)?;
        let code = ResponseCode::try_from(u32::from_be_bytes(header))?;

        let mut message = header.to_vec();
        message.resize(SensorResponse::HEADER_LEN + SensorResponse::body_len(code), 0);
        self.stream.read_exact(&mut message[SensorResponse::HEADER_LEN..])?;

        Ok(SensorResponse::decode(&message)?)
    }

    /// Reads one sensor, turning every non-success answer into [`ClientError::Sensor`].
    pub fn read_value(&mut self, sensor_id: &str) -> Result<f32, ClientError> {
        let response = self.request(sensor_id)?;
        response
            .value()
            .ok_or_else(|| ClientError::Sensor(response.code()))
    }
}

// "host:port" with a numeric port; bare IPv6 literals are handled by the SocketAddr parse.
fn has_port(target: &str) -> bool {
    target.rsplit_once(':').is_some_and(|(host, port)| {
        !host.is_empty() && !host.contains(':') && port.parse::<u16>().is_ok()
    })
}
