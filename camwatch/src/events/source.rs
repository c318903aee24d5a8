//! OS hot-plug event sources
//!
//! The monitor never asks whether a hot-plug facility exists. It subscribes to
//! whichever source was selected at startup; an unavailable source simply
//! never produces events, leaving the poller in charge.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::errors::MonitorError;
use crate::events::types::DeviceEvent;

/// Buffered hot-plug records between a source and the listener
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Source of OS hot-plug records
#[async_trait]
pub trait DeviceEventSource: Send + Sync {
    /// Short name for logs and stats
    fn name(&self) -> &'static str;

    /// Start delivering hot-plug records
    async fn subscribe(&self) -> Result<mpsc::Receiver<DeviceEvent>, MonitorError>;
}

/// Source used when no hot-plug facility is available
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSource;

#[async_trait]
impl DeviceEventSource for NoopEventSource {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<DeviceEvent>, MonitorError> {
        Err(MonitorError::EventSourceUnavailable(
            "no hot-plug facility configured".to_string(),
        ))
    }
}

/// Source fed through a channel by an embedding process or by tests
pub struct ChannelEventSource {
    receiver: Mutex<Option<mpsc::Receiver<DeviceEvent>>>,
}

impl ChannelEventSource {
    /// Create the source and the sender that feeds it
    pub fn new() -> (Self, mpsc::Sender<DeviceEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let source = Self {
            receiver: Mutex::new(Some(rx)),
        };
        (source, tx)
    }
}

#[async_trait]
impl DeviceEventSource for ChannelEventSource {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<DeviceEvent>, MonitorError> {
        self.receiver.lock().await.take().ok_or_else(|| {
            MonitorError::EventSourceError("channel source can only be subscribed once".to_string())
        })
    }
}

/// Pick the hot-plug source for this build
pub fn default_event_source(enabled: bool) -> Arc<dyn DeviceEventSource> {
    #[cfg(feature = "udev")]
    {
        if enabled {
            return Arc::new(udev_source::UdevEventSource::default());
        }
    }

    #[cfg(not(feature = "udev"))]
    {
        if enabled {
            tracing::info!("Built without udev support, hot-plug events unavailable");
        }
    }

    Arc::new(NoopEventSource)
}

#[cfg(feature = "udev")]
pub mod udev_source {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{mpsc, oneshot};
    use tracing::{debug, info};

    use super::{DeviceEventSource, EVENT_CHANNEL_CAPACITY};
    use crate::errors::MonitorError;
    use crate::events::types::{DeviceAction, DeviceEvent, VIDEO_SUBSYSTEM};

    /// Hot-plug source reading a libudev monitor socket
    #[derive(Debug, Clone)]
    pub struct UdevEventSource {
        /// Sleep between drains of the non-blocking socket
        pub idle_interval: Duration,
    }

    impl Default for UdevEventSource {
        fn default() -> Self {
            Self {
                idle_interval: Duration::from_millis(200),
            }
        }
    }

    #[async_trait]
    impl DeviceEventSource for UdevEventSource {
        fn name(&self) -> &'static str {
            "udev"
        }

        async fn subscribe(&self) -> Result<mpsc::Receiver<DeviceEvent>, MonitorError> {
            let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
            let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();
            let idle_interval = self.idle_interval;

            // The socket is created and read on its own thread; it stops once
            // the listener drops the receiver.
            std::thread::Builder::new()
                .name("camwatch-udev".to_string())
                .spawn(move || {
                    let socket = match udev::MonitorBuilder::new()
                        .and_then(|builder| builder.match_subsystem(VIDEO_SUBSYSTEM))
                        .and_then(|builder| builder.listen())
                    {
                        Ok(socket) => {
                            let _ = ready_tx.send(Ok(()));
                            socket
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e.to_string()));
                            return;
                        }
                    };

                    while !tx.is_closed() {
                        for event in socket.iter() {
                            let Some(node) = event.devnode() else {
                                continue;
                            };
                            let action = match event.event_type() {
                                udev::EventType::Add => DeviceAction::Add,
                                udev::EventType::Remove => DeviceAction::Remove,
                                udev::EventType::Change => DeviceAction::Change,
                                _ => continue,
                            };
                            let record = DeviceEvent {
                                device_node: node.to_string_lossy().into_owned(),
                                action,
                                subsystem: event
                                    .subsystem()
                                    .map(|s| s.to_string_lossy().into_owned())
                                    .unwrap_or_default(),
                            };
                            debug!("udev event: {:?}", record);
                            if tx.blocking_send(record).is_err() {
                                return;
                            }
                        }
                        std::thread::sleep(idle_interval);
                    }
                    info!("udev monitor thread exiting");
                })
                .map_err(|e| MonitorError::EventSourceUnavailable(e.to_string()))?;

            match ready_rx.await {
                Ok(Ok(())) => Ok(rx),
                Ok(Err(e)) => Err(MonitorError::EventSourceUnavailable(e)),
                Err(_) => Err(MonitorError::EventSourceUnavailable(
                    "udev monitor thread exited during setup".to_string(),
                )),
            }
        }
    }
}
