//! Polling worker, the fallback discovery path

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, info};

use crate::monitor::engine::{MonitorCore, PollCycle};

/// Run the poller worker
///
/// Each cycle is skipped by the core while hot-plug events are fresh. The
/// sleep between cycles follows the adaptive interval, or the backoff while
/// enumeration keeps failing.
pub async fn run<S, F>(
    core: &MonitorCore,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Poller worker starting...");

    // Initial delay
    tokio::select! {
        _ = &mut shutdown_signal => {
            info!("Poller worker shutting down...");
            return;
        }
        _ = sleep_fn(core.options().initial_poll_delay) => {}
    }

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Poller worker shutting down...");
                return;
            }
            cycle = core.poll_once() => {
                if let PollCycle::Completed { connected, disconnected, .. } = cycle {
                    if connected + disconnected > 0 {
                        info!("Polling found {} new and {} removed cameras", connected, disconnected);
                    }
                }
            }
        }

        let wait = core.next_poll_delay().await;
        debug!("Next polling cycle in {:?}", wait);

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Poller worker shutting down...");
                return;
            }
            _ = sleep_fn(wait) => {}
        }
    }
}
