//! Main application run loop

use std::future::Future;

use tracing::{error, info};

use crate::app::options::AppOptions;
use crate::errors::MonitorError;
use crate::events::types::CameraEvent;
use crate::monitor::engine::HybridCameraMonitor;

/// Run the camera monitor until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), MonitorError> {
    info!("Initializing camera monitor...");

    let monitor = HybridCameraMonitor::new(options.monitor)?;
    monitor.add_event_callback(log_camera_event).await;

    if let Err(e) = monitor.start().await {
        error!("Failed to start camera monitor: {}", e);
        monitor.stop().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    let stats = monitor.get_monitor_stats().await;
    info!("Final monitor stats: {}", serde_json::to_string(&stats)?);

    monitor.stop().await
}

fn log_camera_event(event: &CameraEvent) -> anyhow::Result<()> {
    info!(
        event_id = %event.id,
        "{:?}: {} ({}, driver '{}')",
        event.kind,
        event.device_path,
        event.device.name,
        event.device.driver
    );
    Ok(())
}
