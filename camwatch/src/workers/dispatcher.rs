//! Dispatcher worker delivering queued camera events

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, info};

use crate::events::dispatcher::EventDispatcher;

/// Run the dispatcher worker
///
/// Holds the event queue for its whole lifetime. Events still queued when the
/// shutdown signal fires are delivered before returning.
pub async fn run(
    dispatcher: &EventDispatcher,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!("Dispatcher worker starting...");
    let mut queue = dispatcher.lock_queue().await;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_signal => {
                let mut drained = 0;
                while let Ok(event) = queue.try_recv() {
                    dispatcher.deliver(&event).await;
                    drained += 1;
                }
                info!("Dispatcher worker shutting down ({} events drained)...", drained);
                return;
            }
            event = queue.recv() => {
                let Some(event) = event else {
                    return;
                };
                let failed = dispatcher.deliver(&event).await;
                debug!(
                    "Delivered {:?} for {} ({} handler failures)",
                    event.kind, event.device_path, failed
                );
            }
        }
    }
}
