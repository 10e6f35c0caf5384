use log::{debug, warn};
use std::io;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::models::{SensorState, SensorTable};
use crate::protocol::{ProtocolError, SensorRequest, SensorResponse, MAGIC, MAX_REQUEST_LEN};

/// What the server loop should do with a connection after serving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Keep,
    Close,
}

/// An accepted client, owned by the server's active set. Dropping it closes the socket.
#[derive(Debug)]
pub struct Connection {
    pub(crate) stream: TcpStream,
    pub(crate) peer: SocketAddr,
    // Start of a request whose terminator has not arrived yet.
    pending: Vec<u8>,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            pending: Vec::new(),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

/// Chooses the response for a well-formed request.
pub fn respond(table: &SensorTable, request: &SensorRequest) -> SensorResponse {
    let Some(entry) = table.get(&request.sensor_id) else {
        return SensorResponse::SensorNotFound;
    };

    match entry.state() {
        SensorState::RequestedButNotFound => SensorResponse::SensorNotFound,
        SensorState::FoundButNotMonitored => SensorResponse::SensorNotMonitored,
        SensorState::Monitored => {
            let value = entry.value();
            if value <= 0.0 {
                SensorResponse::SensorFailed
            } else {
                SensorResponse::Success(value)
            }
        }
    }
}

/// True while `pending` can still grow into a valid request.
fn is_incomplete(pending: &[u8], error: &ProtocolError) -> bool {
    if pending.len() >= MAX_REQUEST_LEN {
        return false;
    }
    match error {
        ProtocolError::Truncated(_) => MAGIC.starts_with(pending),
        ProtocolError::MissingTerminator => true,
        _ => false,
    }
}

/// Services one request on a connection the server found readable.
///
/// A request split over several reads is collected until its terminator
/// arrives, up to [`MAX_REQUEST_LEN`] bytes.
pub async fn serve(conn: &mut Connection, table: &SensorTable) -> Decision {
    let mut buf = [0u8; MAX_REQUEST_LEN];
    let n = match conn.stream.try_read(&mut buf) {
        Ok(0) => {
            debug!("Connection closed by {}", conn.peer);
            return Decision::Close;
        }
        Ok(n) => n,
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
            // Readiness was stale; nothing to serve yet.
            return Decision::Keep;
        }
        Err(e) => {
            debug!("receive() failed for {}: {}", conn.peer, e);
            return Decision::Close;
        }
    };
    conn.pending.extend_from_slice(&buf[..n]);

    let request = match SensorRequest::decode(&conn.pending) {
        Ok(request) => {
            conn.pending.clear();
            request
        }
        Err(e) if is_incomplete(&conn.pending, &e) => {
            debug!("Partial request from {} ({} bytes so far)", conn.peer, conn.pending.len());
            return Decision::Keep;
        }
        Err(e) => {
            debug!("Invalid request from {} ({}), disconnecting", conn.peer, e);
            if let Err(e) = send(conn, SensorResponse::InvalidRequest).await {
                warn!("send() failed for {}: {}", conn.peer, e);
            }
            return Decision::Close;
        }
    };

    let response = respond(table, &request);
    match response {
        SensorResponse::Success(value) => {
            debug!("Sending value of sensor {} to {}: {}", request.sensor_id, conn.peer, value)
        }
        SensorResponse::SensorNotFound => debug!("Sensor not found: {}", request.sensor_id),
        SensorResponse::SensorNotMonitored => debug!("Sensor not monitored: {}", request.sensor_id),
        SensorResponse::SensorFailed => {
            debug!("Sensor reading is not ready: {}", request.sensor_id)
        }
        SensorResponse::InvalidRequest => {}
    }

    match send(conn, response).await {
        Ok(()) => Decision::Keep,
        Err(e) => {
            warn!("send() failed for {}: {}", conn.peer, e);
            Decision::Close
        }
    }
}

async fn send(conn: &mut Connection, response: SensorResponse) -> io::Result<()> {
    conn.stream.write_all(&response.encode()).await
}
