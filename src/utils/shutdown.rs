use tokio::sync::watch;

/// Owner side of the service-wide stop signal.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

/// Observer side of the stop signal, handed to every long-running loop.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownListener {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal is triggered or its owner is gone.
    pub async fn triggered(&mut self) {
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_listener() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();
        assert!(!listener.is_triggered());

        let waiter = tokio::spawn(async move {
            listener.triggered().await;
            listener.is_triggered()
        });
        shutdown.trigger();

        let seen = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(seen);
    }

    #[tokio::test]
    async fn test_listener_created_after_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let mut listener = shutdown.listener();
        assert!(listener.is_triggered());
        tokio::time::timeout(Duration::from_millis(100), listener.triggered())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_owner_releases_listener() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();
        drop(shutdown);
        tokio::time::timeout(Duration::from_millis(100), listener.triggered())
            .await
            .unwrap();
    }
}
