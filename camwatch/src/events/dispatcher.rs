//! Ordered fan-out of camera events to consumer callbacks

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{mpsc, Mutex, MutexGuard, RwLock};
use tracing::{debug, error};

use crate::events::types::CameraEvent;

/// Consumer of camera lifecycle events
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &CameraEvent) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> EventHandler for F
where
    F: Fn(&CameraEvent) -> anyhow::Result<()> + Send + Sync,
{
    async fn handle(&self, event: &CameraEvent) -> anyhow::Result<()> {
        (self)(event)
    }
}

/// Queue plus registered handlers.
///
/// Events are queued by the registry owner while it holds its lock, so queue
/// order is mutation order. Delivery happens elsewhere, without that lock,
/// which lets handlers read the monitor while they run.
pub struct EventDispatcher {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
    queue_tx: mpsc::UnboundedSender<CameraEvent>,
    queue_rx: Mutex<mpsc::UnboundedReceiver<CameraEvent>>,
    queued: AtomicU64,
    delivered: AtomicU64,
    failures: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Self {
            handlers: RwLock::new(Vec::new()),
            queue_tx,
            queue_rx: Mutex::new(queue_rx),
            queued: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub async fn add_handler(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }

    /// Queue an event for delivery
    pub fn enqueue(&self, event: CameraEvent) {
        debug!("Queueing {:?} for {}", event.kind, event.device_path);
        // The receiver lives as long as `self`, so sending cannot fail here
        if self.queue_tx.send(event).is_ok() {
            self.queued.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Deliver one event to every handler; returns the number of handlers that failed
    pub async fn deliver(&self, event: &CameraEvent) -> usize {
        let handlers: Vec<Arc<dyn EventHandler>> = self.handlers.read().await.clone();

        let mut failed = 0;
        for handler in handlers {
            match AssertUnwindSafe(handler.handle(event)).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(
                        "Event handler failed for {:?} on {}: {:#}",
                        event.kind, event.device_path, e
                    );
                    failed += 1;
                }
                Err(_) => {
                    error!(
                        "Event handler panicked for {:?} on {}",
                        event.kind, event.device_path
                    );
                    failed += 1;
                }
            }
        }

        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(failed as u64, Ordering::Relaxed);
        failed
    }

    /// Deliver everything queued so far.
    ///
    /// Returns the number of events delivered. Does nothing while the
    /// dispatcher worker owns the queue.
    pub async fn dispatch_pending(&self) -> usize {
        let Ok(mut queue) = self.queue_rx.try_lock() else {
            return 0;
        };

        let mut count = 0;
        while let Ok(event) = queue.try_recv() {
            self.deliver(&event).await;
            count += 1;
        }
        count
    }

    /// Exclusive access to the queue, held by the dispatcher worker while it runs
    pub async fn lock_queue(&self) -> MutexGuard<'_, mpsc::UnboundedReceiver<CameraEvent>> {
        self.queue_rx.lock().await
    }

    pub fn events_queued(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    pub fn events_delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn handler_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
