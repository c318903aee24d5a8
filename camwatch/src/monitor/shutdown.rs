//! Worker shutdown coordination

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::errors::MonitorError;

/// Join handles of the running workers plus the channel that stops them
pub struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    max_shutdown_delay: Duration,
    listener_handle: Option<JoinHandle<()>>,
    poller_handle: Option<JoinHandle<()>>,
    dispatcher_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, max_shutdown_delay: Duration) -> Self {
        Self {
            shutdown_tx,
            max_shutdown_delay,
            listener_handle: None,
            poller_handle: None,
            dispatcher_handle: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn with_listener_handle(&mut self, handle: JoinHandle<()>) -> Result<(), MonitorError> {
        if self.listener_handle.is_some() {
            return Err(MonitorError::ShutdownError("listener_handle already set".to_string()));
        }
        self.listener_handle = Some(handle);
        Ok(())
    }

    pub fn with_poller_handle(&mut self, handle: JoinHandle<()>) -> Result<(), MonitorError> {
        if self.poller_handle.is_some() {
            return Err(MonitorError::ShutdownError("poller_handle already set".to_string()));
        }
        self.poller_handle = Some(handle);
        Ok(())
    }

    pub fn with_dispatcher_handle(&mut self, handle: JoinHandle<()>) -> Result<(), MonitorError> {
        if self.dispatcher_handle.is_some() {
            return Err(MonitorError::ShutdownError("dispatcher_handle already set".to_string()));
        }
        self.dispatcher_handle = Some(handle);
        Ok(())
    }

    /// Signal every worker and wait for them, aborting any that outlive the grace period
    pub async fn shutdown(&mut self) -> Result<(), MonitorError> {
        let _ = self.shutdown_tx.send(());

        // Producers first so the dispatcher sees their last events
        let workers = [
            ("listener", self.listener_handle.take()),
            ("poller", self.poller_handle.take()),
            ("dispatcher", self.dispatcher_handle.take()),
        ];

        let mut result = Ok(());
        for (name, handle) in workers {
            let Some(mut handle) = handle else {
                continue;
            };

            match tokio::time::timeout(self.max_shutdown_delay, &mut handle).await {
                Ok(Ok(())) => info!("{} worker stopped", name),
                Ok(Err(e)) if e.is_cancelled() => info!("{} worker cancelled", name),
                Ok(Err(e)) => {
                    error!("{} worker failed: {}", name, e);
                    result = Err(MonitorError::ShutdownError(format!("{} worker: {}", name, e)));
                }
                Err(_) => {
                    warn!(
                        "{} worker did not stop within {:?}, aborting",
                        name, self.max_shutdown_delay
                    );
                    handle.abort();
                }
            }
        }

        result
    }
}
