//! Hybrid camera monitor: hot-plug events plus a polling fallback feeding one registry

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::app::options::MonitorOptions;
use crate::capability::metadata::CapabilityMetadata;
use crate::errors::MonitorError;
use crate::events::dispatcher::{EventDispatcher, EventHandler};
use crate::events::source::{default_event_source, DeviceEventSource};
use crate::events::types::{CameraEvent, CameraEventKind, DeviceAction, DeviceEvent};
use crate::hardware::camera::{enumerate_device_nodes, is_accessible, node_exists, parse_device_index, Device};
use crate::monitor::freshness::EventFreshness;
use crate::monitor::interval::AdaptivePollInterval;
use crate::monitor::registry::Registry;
use crate::monitor::shutdown::ShutdownManager;
use crate::monitor::stats::{MonitorStats, StatsCounters};
use crate::probe::prober::{Prober, V4l2CtlProber};
use crate::probe::result::CapabilityProbeResult;
use crate::workers::{dispatcher, listener, poller};

/// Outcome of one polling cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollCycle {
    /// Hot-plug events were fresh, nothing enumerated
    Skipped,

    /// The device directory could not be listed
    Failed { error: String },

    Completed {
        connected: usize,
        disconnected: usize,
        reprobed: usize,
    },
}

/// State shared by the workers and the public facade
pub struct MonitorCore {
    options: MonitorOptions,
    prober: Arc<dyn Prober>,
    event_source: Arc<dyn DeviceEventSource>,
    registry: Mutex<Registry>,
    interval: Mutex<AdaptivePollInterval>,
    freshness: EventFreshness,
    dispatcher: EventDispatcher,
    counters: StatsCounters,
    running: AtomicBool,
    event_source_available: AtomicBool,
}

impl MonitorCore {
    fn new(
        options: MonitorOptions,
        prober: Arc<dyn Prober>,
        event_source: Arc<dyn DeviceEventSource>,
    ) -> Self {
        let interval = AdaptivePollInterval::new(
            options.poll_interval,
            options.min_poll_interval,
            options.max_poll_interval,
            options.max_backoff,
        );

        Self {
            registry: Mutex::new(Registry::new(options.capability_policy())),
            interval: Mutex::new(interval),
            options,
            prober,
            event_source,
            freshness: EventFreshness::new(),
            dispatcher: EventDispatcher::new(),
            counters: StatsCounters::default(),
            running: AtomicBool::new(false),
            event_source_available: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &MonitorOptions {
        &self.options
    }

    pub fn event_source(&self) -> &Arc<dyn DeviceEventSource> {
        &self.event_source
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn freshness(&self) -> &EventFreshness {
        &self.freshness
    }

    pub fn set_event_source_available(&self, available: bool) {
        self.event_source_available.store(available, Ordering::SeqCst);
    }

    // ============================== HOT-PLUG EVENTS ================================ //

    /// Apply one hot-plug record; returns the camera event it produced, if any
    pub async fn handle_device_event(&self, event: DeviceEvent) -> Option<CameraEvent> {
        StatsCounters::bump(&self.counters.events_processed);

        if !event.is_video() {
            return self.filtered(&event, "not a video4linux device");
        }
        // Only video records count as proof the hot-plug path is alive
        self.freshness.touch();
        let Some(index) = parse_device_index(&event.device_node) else {
            return self.filtered(&event, "not a video device node");
        };
        if !self.options.in_range(index) {
            return self.filtered(&event, "index outside the monitored range");
        }

        match event.action {
            DeviceAction::Add => self.handle_add(&event, index).await,
            DeviceAction::Remove => self.handle_remove(&event.device_node).await,
            DeviceAction::Change => self.handle_change(&event).await,
        }
    }

    fn filtered(&self, event: &DeviceEvent, reason: &str) -> Option<CameraEvent> {
        StatsCounters::bump(&self.counters.events_filtered);
        debug!(
            "Ignoring {:?} for {} ({}): {}",
            event.action, event.device_node, event.subsystem, reason
        );
        None
    }

    async fn handle_add(&self, event: &DeviceEvent, index: u32) -> Option<CameraEvent> {
        let path = event.device_node.as_str();
        if !node_exists(path).await || !is_accessible(path).await {
            return self.filtered(event, "device node is not accessible");
        }

        let epoch = self.registry.lock().await.begin_add(path);
        let probe = self.probe_device(path).await;

        let mut registry = self.registry.lock().await;
        let camera_event = registry.complete_add(path, index, epoch, probe)?;
        Some(self.emit(camera_event))
    }

    async fn handle_remove(&self, path: &str) -> Option<CameraEvent> {
        let mut registry = self.registry.lock().await;
        let camera_event = registry.remove(path)?;
        Some(self.emit(camera_event))
    }

    async fn handle_change(&self, event: &DeviceEvent) -> Option<CameraEvent> {
        let path = event.device_node.as_str();
        if !node_exists(path).await {
            debug!("{} changed but its node is gone, treating as removal", path);
            return self.handle_remove(path).await;
        }
        if !is_accessible(path).await {
            debug!("{} changed and is not accessible right now", path);
        }

        let mut registry = self.registry.lock().await;
        match registry.mark_changed(path) {
            Some(camera_event) => Some(self.emit(camera_event)),
            None => {
                drop(registry);
                self.filtered(event, "change for an unknown device")
            }
        }
    }

    /// Queue an event; callers hold the registry lock so queue order is mutation order
    fn emit(&self, event: CameraEvent) -> CameraEvent {
        self.dispatcher.enqueue(event.clone());
        event
    }

    // ================================== POLLING ==================================== //

    /// Run one polling cycle
    pub async fn poll_once(&self) -> PollCycle {
        if self.freshness.is_fresh(self.options.event_freshness_threshold) {
            StatsCounters::bump(&self.counters.polling_cycles_skipped);
            let mut interval = self.interval.lock().await;
            if interval.on_fresh() {
                debug!("Hot-plug events are fresh, polling every {:?}", interval.current());
            }
            return PollCycle::Skipped;
        }

        StatsCounters::bump(&self.counters.polling_cycles);
        {
            let mut interval = self.interval.lock().await;
            if interval.on_stale() {
                debug!("Hot-plug events are stale, polling every {:?}", interval.current());
            }
        }

        // Snapshot before listing: a device registered by an event after this
        // point may have a node the listing below does not show yet.
        let known: HashSet<String> = self.registry.lock().await.known_paths().into_iter().collect();

        let nodes = match enumerate_device_nodes(&self.options.device_dir, &self.options.device_range).await {
            Ok(nodes) => nodes,
            Err(e) => {
                let error = e.to_string();
                let delay = self.interval.lock().await.record_failure(error.clone());
                warn!("Device enumeration failed: {}, retrying in {:?}", error, delay);
                return PollCycle::Failed { error };
            }
        };

        if let Some(streak) = self.interval.lock().await.record_success() {
            info!("Device enumeration recovered after {} failed attempts", streak);
        }

        let present: HashSet<&str> = nodes.iter().map(|(_, path)| path.as_str()).collect();

        let mut candidates = Vec::new();
        for (index, path) in &nodes {
            if known.contains(path) {
                if self.options.reprobe_known_devices {
                    candidates.push((*index, path.clone(), None));
                }
            } else if is_accessible(path).await {
                candidates.push((*index, path.clone(), Some(0)));
            } else {
                debug!("Skipping inaccessible device node {}", path);
            }
        }

        let mut gone: Vec<&String> = known.iter().filter(|path| !present.contains(path.as_str())).collect();
        gone.sort();

        let mut disconnected = 0;
        {
            let mut registry = self.registry.lock().await;
            for path in gone {
                if let Some(camera_event) = registry.remove(path) {
                    self.emit(camera_event);
                    disconnected += 1;
                }
            }
            for (_, path, epoch) in candidates.iter_mut() {
                if epoch.is_some() {
                    *epoch = Some(registry.begin_add(path));
                }
            }
        }

        let probes = join_all(candidates.iter().map(|(_, path, _)| self.probe_device(path))).await;

        let mut connected = 0;
        let mut reprobed = 0;
        let mut registry = self.registry.lock().await;
        for ((index, path, epoch), probe) in candidates.into_iter().zip(probes) {
            let camera_event = match epoch {
                Some(epoch) => registry.complete_add(&path, index, epoch, probe),
                None => {
                    reprobed += 1;
                    registry.apply_probe(&path, probe)
                }
            };
            if let Some(camera_event) = camera_event {
                if camera_event.kind == CameraEventKind::Connected {
                    connected += 1;
                }
                self.emit(camera_event);
            }
        }

        debug!(
            "Polling cycle done: {} connected, {} disconnected, {} re-probed",
            connected, disconnected, reprobed
        );
        PollCycle::Completed {
            connected,
            disconnected,
            reprobed,
        }
    }

    /// Delay before the next polling cycle
    pub async fn next_poll_delay(&self) -> Duration {
        self.interval.lock().await.next_delay()
    }

    async fn probe_device(&self, path: &str) -> CapabilityProbeResult {
        StatsCounters::bump(&self.counters.probes_attempted);
        let result = self.prober.probe(path).await;

        if result.detected {
            StatsCounters::bump(&self.counters.probes_succeeded);
        } else if result.is_timeout() {
            StatsCounters::bump(&self.counters.probe_timeouts);
        }
        debug!(
            "Probed {}: detected={} accessible={} in {:?}",
            path, result.detected, result.accessible, result.duration
        );
        result
    }

    // ================================== FACADE ===================================== //

    pub async fn get_connected_cameras(&self) -> HashMap<String, Device> {
        self.registry.lock().await.devices()
    }

    pub async fn get_effective_capability_metadata(&self, device_path: &str) -> Option<CapabilityMetadata> {
        self.registry.lock().await.metadata(device_path)
    }

    pub async fn get_monitor_stats(&self) -> MonitorStats {
        let known_devices = self.registry.lock().await.len();
        let interval = self.interval.lock().await.clone();

        MonitorStats {
            running: self.running.load(Ordering::SeqCst),
            event_source_available: self.event_source_available.load(Ordering::SeqCst),
            event_source_name: self.event_source.name().to_string(),
            events_processed: StatsCounters::read(&self.counters.events_processed),
            events_filtered: StatsCounters::read(&self.counters.events_filtered),
            events_emitted: self.dispatcher.events_queued(),
            polling_cycles: StatsCounters::read(&self.counters.polling_cycles),
            polling_cycles_skipped: StatsCounters::read(&self.counters.polling_cycles_skipped),
            polling_failure_count: interval.failure_count(),
            total_polling_failures: interval.total_failures(),
            adaptive_adjustments: interval.adjustments(),
            current_poll_interval_ms: interval.current().as_millis() as u64,
            last_event_age_ms: self.freshness.age().map(|age| age.as_millis() as u64),
            probes_attempted: StatsCounters::read(&self.counters.probes_attempted),
            probes_succeeded: StatsCounters::read(&self.counters.probes_succeeded),
            probe_timeouts: StatsCounters::read(&self.counters.probe_timeouts),
            callback_failures: self.dispatcher.handler_failures(),
            known_devices,
            last_enumeration_error: interval.last_error().map(str::to_string),
        }
    }
}

/// Hybrid camera monitor
///
/// Owns the workers. Every read and write of device state goes through the
/// shared [`MonitorCore`].
pub struct HybridCameraMonitor {
    core: Arc<MonitorCore>,
    workers: Mutex<Option<ShutdownManager>>,
}

impl HybridCameraMonitor {
    /// Monitor probing with `v4l2-ctl` and listening to the build's hot-plug source
    pub fn new(options: MonitorOptions) -> Result<Self, MonitorError> {
        options.validate()?;
        let prober = Arc::new(V4l2CtlProber::new(options.probe_tool.clone(), options.probe_timeout));
        let event_source = default_event_source(options.enable_event_source);
        Self::with_components(options, prober, event_source)
    }

    /// Monitor with an explicit prober and hot-plug source
    pub fn with_components(
        options: MonitorOptions,
        prober: Arc<dyn Prober>,
        event_source: Arc<dyn DeviceEventSource>,
    ) -> Result<Self, MonitorError> {
        options.validate()?;
        Ok(Self {
            core: Arc::new(MonitorCore::new(options, prober, event_source)),
            workers: Mutex::new(None),
        })
    }

    /// Start the listener, poller and dispatcher workers; a no-op when running
    pub async fn start(&self) -> Result<(), MonitorError> {
        let mut workers = self.workers.lock().await;
        if workers.is_some() {
            debug!("Camera monitor already running");
            return Ok(());
        }

        info!(
            "Starting camera monitor (devices {:?} in {}, event source: {})",
            self.core.options.device_range,
            self.core.options.device_dir.display(),
            self.core.event_source.name()
        );

        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        let mut manager = ShutdownManager::new(shutdown_tx, self.core.options.max_shutdown_delay);

        init_dispatcher_worker(self.core.clone(), &mut manager)?;
        init_listener_worker(self.core.clone(), &mut manager)?;
        init_poller_worker(self.core.clone(), &mut manager)?;

        self.core.running.store(true, Ordering::SeqCst);
        *workers = Some(manager);
        Ok(())
    }

    /// Stop all workers; a no-op when not running
    pub async fn stop(&self) -> Result<(), MonitorError> {
        let Some(mut manager) = self.workers.lock().await.take() else {
            debug!("Camera monitor already stopped");
            return Ok(());
        };

        info!("Stopping camera monitor...");
        let result = manager.shutdown().await;
        self.core.running.store(false, Ordering::SeqCst);
        self.core.set_event_source_available(false);
        info!("Camera monitor stopped");
        result
    }

    /// Shared state, for embedding custom workers
    pub fn core(&self) -> &Arc<MonitorCore> {
        &self.core
    }

    pub fn is_running(&self) -> bool {
        self.core.running.load(Ordering::SeqCst)
    }

    pub fn options(&self) -> &MonitorOptions {
        &self.core.options
    }

    /// Register a consumer of camera events
    pub async fn add_event_callback<H>(&self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.core.dispatcher.add_handler(Arc::new(handler)).await;
    }

    /// Apply one hot-plug record directly, probing inline for `add`
    pub async fn handle_device_event(&self, event: DeviceEvent) -> Option<CameraEvent> {
        self.core.handle_device_event(event).await
    }

    /// Run one polling cycle regardless of the poller worker
    pub async fn poll_once(&self) -> PollCycle {
        self.core.poll_once().await
    }

    /// Deliver queued events when the dispatcher worker is not running
    pub async fn dispatch_pending(&self) -> usize {
        self.core.dispatcher.dispatch_pending().await
    }

    pub async fn get_connected_cameras(&self) -> HashMap<String, Device> {
        self.core.get_connected_cameras().await
    }

    pub async fn get_effective_capability_metadata(&self, device_path: &str) -> Option<CapabilityMetadata> {
        self.core.get_effective_capability_metadata(device_path).await
    }

    pub async fn get_monitor_stats(&self) -> MonitorStats {
        self.core.get_monitor_stats().await
    }
}

// =============================== WORKER STARTUP ================================== //

fn init_dispatcher_worker(core: Arc<MonitorCore>, manager: &mut ShutdownManager) -> Result<(), MonitorError> {
    debug!("Initializing dispatcher worker...");
    let mut shutdown_rx = manager.subscribe();

    let handle = tokio::spawn(async move {
        dispatcher::run(
            core.dispatcher(),
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    manager.with_dispatcher_handle(handle)
}

fn init_listener_worker(core: Arc<MonitorCore>, manager: &mut ShutdownManager) -> Result<(), MonitorError> {
    debug!("Initializing listener worker...");
    let mut shutdown_rx = manager.subscribe();

    let handle = tokio::spawn(async move {
        listener::run(
            core,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    manager.with_listener_handle(handle)
}

fn init_poller_worker(core: Arc<MonitorCore>, manager: &mut ShutdownManager) -> Result<(), MonitorError> {
    debug!("Initializing poller worker...");
    let mut shutdown_rx = manager.subscribe();

    let handle = tokio::spawn(async move {
        poller::run(
            core.as_ref(),
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    manager.with_poller_handle(handle)
}
