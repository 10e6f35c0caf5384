//! Single-task TCP server multiplexing every client on readiness.
//!
//! The loop waits for the first of: the shutdown signal, a readiness event
//! on the listener or any accepted client, or a short timeout. The listener
//! only takes part in the wait while fewer than `max_clients` connections are
//! open, which is how backpressure is applied: surplus clients stay in the
//! kernel backlog until a slot frees up.

use log::{debug, error, info, trace};
use std::future::poll_fn;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

use crate::models::SensorTable;
use crate::utils::shutdown::ShutdownListener;

mod session;

pub use session::{respond, serve, Connection, Decision};

/// Upper bound on one readiness wait, after which the loop goes round again.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to start TCP server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("accept() failed: {0}")]
    Accept(#[source] io::Error),
}

/// Members of the waited-on set that became ready together.
#[derive(Debug, Default)]
struct ReadySet {
    accepted: Option<io::Result<(TcpStream, SocketAddr)>>,
    clients: Vec<usize>,
}

/// Polls the listener (when admitting) and every client once; ready if any of them is.
fn poll_ready(
    listener: Option<&TcpListener>,
    clients: &[Connection],
    cx: &mut Context<'_>,
) -> Poll<ReadySet> {
    let mut ready = ReadySet::default();

    if let Some(listener) = listener {
        if let Poll::Ready(accepted) = listener.poll_accept(cx) {
            ready.accepted = Some(accepted);
        }
    }

    for (idx, conn) in clients.iter().enumerate() {
        // An error also counts as ready; the session sees it on read.
        if conn.stream.poll_read_ready(cx).is_ready() {
            ready.clients.push(idx);
        }
    }

    if ready.accepted.is_none() && ready.clients.is_empty() {
        Poll::Pending
    } else {
        Poll::Ready(ready)
    }
}

pub struct Server {
    listener: TcpListener,
    max_clients: usize,
    table: Arc<SensorTable>,
}

impl Server {
    pub async fn bind(
        addr: SocketAddr,
        max_clients: u16,
        table: Arc<SensorTable>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        debug!("TCP server bound to {}", addr);

        Ok(Self {
            listener,
            max_clients: usize::from(max_clients.max(1)),
            table,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves clients until `shutdown` fires or accepting fails.
    ///
    /// Every connection still open when the loop ends is closed here; the
    /// listener itself stays with the `Server`.
    pub async fn run(&self, mut shutdown: ShutdownListener) -> Result<(), ServerError> {
        let mut clients: Vec<Connection> = Vec::with_capacity(self.max_clients);
        if let Ok(addr) = self.local_addr() {
            info!("TCP server listening on {} (max {} clients)", addr, self.max_clients);
        }

        let result = loop {
            let listener = (clients.len() < self.max_clients).then_some(&self.listener);

            let ready = tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    debug!("Shutdown requested, leaving server loop");
                    break Ok(());
                }
                ready = tokio::time::timeout(
                    WAIT_TIMEOUT,
                    poll_fn(|cx| poll_ready(listener, &clients, cx)),
                ) => ready,
            };

            let Ok(ready) = ready else {
                trace!(
                    "No activity for {} s, {} clients connected",
                    WAIT_TIMEOUT.as_secs(),
                    clients.len()
                );
                continue;
            };

            if let Some(accepted) = ready.accepted {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!("New connection from {}", peer);
                        clients.push(Connection::new(stream, peer));
                        if clients.len() == self.max_clients {
                            info!(
                                "Reached {} connected clients, holding back new connections",
                                self.max_clients
                            );
                        }
                    }
                    Err(e) => {
                        error!("accept() failed: {}", e);
                        break Err(ServerError::Accept(e));
                    }
                }
            }

            // Highest index first, so swap_remove only moves connections already served.
            for idx in ready.clients.into_iter().rev() {
                if serve(&mut clients[idx], &self.table).await == Decision::Close {
                    let was_full = clients.len() >= self.max_clients;
                    let conn = clients.swap_remove(idx);
                    debug!("Connection from {} closed", conn.peer());
                    if was_full {
                        info!("Client slot freed, accepting new connections again");
                    }
                }
            }
        };

        for conn in clients.drain(..) {
            debug!("Closing connection from {}", conn.peer());
        }
        info!("TCP server stopped");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{SensorRequest, SensorResponse};
    use crate::utils::shutdown::Shutdown;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::task::JoinHandle;

    type ServerTask = JoinHandle<Result<(), ServerError>>;

    async fn start(max_clients: u16) -> (SocketAddr, Shutdown, ServerTask) {
        let table = Arc::new(SensorTable::build(["cpu"], &["cpu".to_string()]));
        table.get("cpu").unwrap().store(40.0);

        let server = Server::bind("127.0.0.1:0".parse().unwrap(), max_clients, table)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let listener = shutdown.listener();
        let task = tokio::spawn(async move { server.run(listener).await });
        (addr, shutdown, task)
    }

    async fn send_request(stream: &mut TcpStream, id: &str) {
        stream
            .write_all(&SensorRequest::new(id).encode().unwrap())
            .await
            .unwrap();
    }

    async fn read_value(stream: &mut TcpStream, wait: Duration) -> Option<SensorResponse> {
        let mut buf = [0u8; 8];
        match tokio::time::timeout(wait, stream.read_exact(&mut buf)).await {
            Ok(read) => {
                read.unwrap();
                Some(SensorResponse::decode(&buf).unwrap())
            }
            Err(_) => None,
        }
    }

    async fn query(stream: &mut TcpStream) -> Option<SensorResponse> {
        send_request(stream, "cpu").await;
        read_value(stream, Duration::from_secs(2)).await
    }

    #[tokio::test]
    async fn test_serves_many_requests_per_connection() {
        let (addr, shutdown, task) = start(4).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        for _ in 0..5 {
            assert_eq!(query(&mut client).await, Some(SensorResponse::Success(40.0)));
        }

        shutdown.trigger();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_admission_cap() {
        let (addr, shutdown, task) = start(2).await;

        let mut first = TcpStream::connect(addr).await.unwrap();
        let mut second = TcpStream::connect(addr).await.unwrap();
        assert!(query(&mut first).await.is_some());
        assert!(query(&mut second).await.is_some());

        // Completes the TCP handshake in the backlog but is never accepted.
        let mut third = TcpStream::connect(addr).await.unwrap();
        send_request(&mut third, "cpu").await;
        assert_eq!(read_value(&mut third, Duration::from_millis(300)).await, None);

        drop(first);
        assert_eq!(
            read_value(&mut third, Duration::from_secs(2)).await,
            Some(SensorResponse::Success(40.0))
        );
        assert!(query(&mut second).await.is_some());

        shutdown.trigger();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_invalid_client_frees_its_slot() {
        let (addr, shutdown, task) = start(1).await;

        let mut intruder = TcpStream::connect(addr).await.unwrap();
        intruder.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        let mut buf = Vec::new();
        tokio::time::timeout(Duration::from_secs(2), intruder.read_to_end(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(SensorResponse::decode(&buf).unwrap(), SensorResponse::InvalidRequest);

        let mut client = TcpStream::connect(addr).await.unwrap();
        assert_eq!(query(&mut client).await, Some(SensorResponse::Success(40.0)));

        shutdown.trigger();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_closes_clients() {
        let (addr, shutdown, task) = start(2).await;
        let mut client = TcpStream::connect(addr).await.unwrap();
        assert!(query(&mut client).await.is_some());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        let mut buf = [0u8; 1];
        let n = tokio::time::timeout(Duration::from_secs(1), client.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_bind_conflict() {
        let (addr, shutdown, task) = start(1).await;
        let table = Arc::new(SensorTable::default());
        let err = Server::bind(addr, 1, table).await.err().unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));

        shutdown.trigger();
        task.await.unwrap().unwrap();
    }
}
