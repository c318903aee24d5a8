//! Listener worker for OS hot-plug records

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::events::types::DeviceAction;
use crate::monitor::engine::MonitorCore;

/// Run the listener worker
///
/// `add` records are handled on their own task so a slow probe never holds
/// up removals. Returns right away when the source is unavailable, leaving
/// discovery to the poller.
pub async fn run(core: Arc<MonitorCore>, mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>) {
    let source_name = core.event_source().name();
    info!("Listener worker starting (source: {})...", source_name);

    let subscribed = tokio::select! {
        _ = &mut shutdown_signal => {
            info!("Listener worker shutting down...");
            return;
        }
        subscribed = core.event_source().subscribe() => subscribed,
    };

    let mut records = match subscribed {
        Ok(records) => records,
        Err(e) => {
            info!("Hot-plug events unavailable ({}), relying on polling", e);
            core.set_event_source_available(false);
            return;
        }
    };
    core.set_event_source_available(true);

    let mut adds = JoinSet::new();
    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Listener worker shutting down...");
                adds.shutdown().await;
                return;
            }
            record = records.recv() => {
                let Some(record) = record else {
                    warn!("Hot-plug source {} closed, relying on polling", source_name);
                    core.set_event_source_available(false);
                    break;
                };
                if record.action == DeviceAction::Add {
                    let core = core.clone();
                    adds.spawn(async move {
                        core.handle_device_event(record).await;
                    });
                } else {
                    core.handle_device_event(record).await;
                }
            }
            Some(joined) = adds.join_next(), if !adds.is_empty() => {
                if let Err(e) = joined {
                    error!("Add handling task failed: {}", e);
                }
            }
        }
    }

    // Source closed: let in-flight adds finish
    while let Some(joined) = adds.join_next().await {
        if let Err(e) = joined {
            error!("Add handling task failed: {}", e);
        }
    }
}
