pub mod client;
pub mod collectors;
pub mod config;
pub mod logging;
pub mod models;
pub mod protocol;
pub mod server;
pub mod utils;

use crate::collectors::{SensorPoller, SensorSource};
use crate::config::AppConfig;
use crate::models::SensorTable;
use crate::server::{Server, ServerError};
use crate::utils::shutdown::{Shutdown, ShutdownListener};
use anyhow::Context;
use log::{debug, error, info, warn};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A running service: the sensor poller and the TCP server loop, each on its own task.
pub struct Service {
    shutdown: Arc<Shutdown>,
    local_addr: SocketAddr,
    table: Arc<SensorTable>,
    server: JoinHandle<Result<(), ServerError>>,
    poller: JoinHandle<()>,
}

impl Service {
    /// Starts on every interface at the configured port.
    pub async fn start(config: &AppConfig, source: Box<dyn SensorSource>) -> anyhow::Result<Self> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
        Self::start_at(config, source, addr).await
    }

    pub async fn start_at(
        config: &AppConfig,
        mut source: Box<dyn SensorSource>,
        addr: SocketAddr,
    ) -> anyhow::Result<Self> {
        debug!("Enumerating sensors from {} source", source.name());
        let hardware = source
            .sensors()
            .context("Failed to initialize sensor monitoring")?;
        let table = Arc::new(SensorTable::build(hardware, &config.monitored_sensors));
        info!(
            "{} sensors known, {} monitored",
            table.len(),
            table.monitored().count()
        );

        let server = Server::bind(addr, config.max_connected_clients, Arc::clone(&table))
            .await
            .context("Failed to start TCP server")?;
        let local_addr = server
            .local_addr()
            .context("Failed to get TCP server address")?;

        let shutdown = Arc::new(Shutdown::new());

        let poller = SensorPoller::new(source, Arc::clone(&table), config.refresh_interval());
        let poller = tokio::spawn(poller.run(shutdown.listener()));

        let listener = shutdown.listener();
        let on_failure = Arc::clone(&shutdown);
        let server = tokio::spawn(async move {
            let result = server.run(listener).await;
            if result.is_err() {
                // Take the poller down with the server.
                on_failure.trigger();
            }
            result
        });

        info!("Service started on {}", local_addr);
        Ok(Self {
            shutdown,
            local_addr,
            table,
            server,
            poller,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn table(&self) -> &Arc<SensorTable> {
        &self.table
    }

    /// Fires when the service is stopping, either on request or after a fatal server error.
    pub fn shutdown_listener(&self) -> ShutdownListener {
        self.shutdown.listener()
    }

    /// Signals both tasks and waits for the server loop, then the poller.
    pub async fn stop(self) -> anyhow::Result<()> {
        debug!("Stopping service");
        self.shutdown.trigger();

        let server = self.server.await.context("TCP server task panicked")?;
        self.poller.await.context("Sensor poller task panicked")?;
        server.context("TCP server loop failed")?;

        info!("Service stopped");
        Ok(())
    }
}

/// Runs the service until Ctrl-C (or SIGTERM on Unix), then shuts it down.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    info!("Starting hwmon-service");

    match serve(&config).await {
        Ok(_) => info!("hwmon-service exited cleanly"),
        Err(e) => {
            error!("Application error: {e:#}");
            // Print chain of error causes
            for cause in e.chain().skip(1) {
                error!("Caused by: {cause}");
            }
            return Err(e).context("Application failed to run");
        }
    }

    Ok(())
}

async fn serve(config: &AppConfig) -> anyhow::Result<()> {
    let source = collectors::detect_source().context("Failed to initialize sensor monitoring")?;
    let service = Service::start(config, source).await?;

    let mut stopping = service.shutdown_listener();
    let signal = tokio::select! {
        signal = wait_for_signal() => signal,
        _ = stopping.triggered() => {
            warn!("Service is stopping on its own");
            Ok(())
        }
    };

    stop_after(service, signal).await
}

/// Stops `service` in every case, then reports the first failure.
async fn stop_after(service: Service, signal: io::Result<()>) -> anyhow::Result<()> {
    match &signal {
        Ok(()) => info!("Shutting down"),
        Err(e) => error!("Failed to listen for termination signals: {}", e),
    }

    let stopped = service.stop().await;
    signal.context("Failed to listen for termination signals")?;
    stopped
}

#[cfg(unix)]
async fn wait_for_signal() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}
