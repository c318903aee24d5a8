//! Discovery engine tests driven through the public monitor API

use std::sync::Arc;
use std::time::Duration;

use camwatch::app::options::MonitorOptions;
use camwatch::capability::state::ValidationStatus;
use camwatch::events::source::{ChannelEventSource, NoopEventSource};
use camwatch::events::types::{CameraEvent, CameraEventKind, DeviceEvent};
use camwatch::{HybridCameraMonitor, PollCycle};
use tokio_test::assert_ok;

use crate::support::{busy_probe, hd_probe, manual_options, EventLog, FakeDevDir, GatedProber, ScriptedProber};

async fn manual_monitor(
    options: MonitorOptions,
    prober: Arc<ScriptedProber>,
) -> (HybridCameraMonitor, EventLog) {
    let monitor = HybridCameraMonitor::with_components(options, prober, Arc::new(NoopEventSource)).unwrap();
    let log = EventLog::default();
    monitor.add_event_callback(log.handler()).await;
    (monitor, log)
}

#[tokio::test]
async fn test_three_polls_confirm_capability_with_one_connected_event() {
    let dev = FakeDevDir::new();
    let path = dev.plug(0);
    let prober = ScriptedProber::new();
    let (monitor, log) = manual_monitor(manual_options(&dev), prober.clone()).await;

    for _ in 0..3 {
        monitor.poll_once().await;
    }
    monitor.dispatch_pending().await;

    assert_eq!(log.kinds(), vec![CameraEventKind::Connected]);
    assert_eq!(prober.calls(), 3);

    let metadata = monitor.get_effective_capability_metadata(&path).await.unwrap();
    assert_eq!(metadata.validation_status, ValidationStatus::Confirmed);
    assert_eq!(metadata.resolution.as_deref(), Some("1920x1080"));
    assert_eq!(metadata.fps, Some(30));
    assert_eq!(metadata.formats, vec!["MJPG"]);
    assert_eq!(metadata.consecutive_successes, 3);
}

#[tokio::test]
async fn test_fewer_polls_than_threshold_stay_provisional() {
    let dev = FakeDevDir::new();
    let path = dev.plug(0);
    let (monitor, _log) = manual_monitor(manual_options(&dev), ScriptedProber::new()).await;

    monitor.poll_once().await;
    monitor.poll_once().await;

    let metadata = monitor.get_effective_capability_metadata(&path).await.unwrap();
    assert_eq!(metadata.validation_status, ValidationStatus::Provisional);
    assert_eq!(metadata.resolution.as_deref(), Some("1920x1080"));
}

#[tokio::test]
async fn test_busy_failure_after_confirmation_keeps_confirmed_data() {
    let dev = FakeDevDir::new();
    let path = dev.plug(0);
    let prober = ScriptedProber::new();
    let (monitor, log) = manual_monitor(manual_options(&dev), prober.clone()).await;

    for _ in 0..3 {
        monitor.poll_once().await;
    }
    prober.push(busy_probe(&path));
    monitor.poll_once().await;
    monitor.dispatch_pending().await;

    let metadata = monitor.get_effective_capability_metadata(&path).await.unwrap();
    assert_eq!(metadata.validation_status, ValidationStatus::Confirmed);
    assert_eq!(metadata.consecutive_failures, 1);
    assert_eq!(metadata.consecutive_successes, 0);
    assert_eq!(metadata.resolution.as_deref(), Some("1920x1080"));
    assert_eq!(metadata.fps, Some(30));

    // Still connected, nothing beyond the original CONNECTED
    assert_eq!(log.kinds(), vec![CameraEventKind::Connected]);
    assert!(monitor.get_connected_cameras().await.contains_key(&path));
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let dev = FakeDevDir::new();
    let path = dev.plug(0);
    let (monitor, log) = manual_monitor(manual_options(&dev), ScriptedProber::new()).await;

    let connected = monitor.handle_device_event(DeviceEvent::add(&path)).await.unwrap();
    assert_eq!(connected.kind, CameraEventKind::Connected);

    let removed = monitor.handle_device_event(DeviceEvent::remove(&path)).await.unwrap();
    assert_eq!(removed.kind, CameraEventKind::Disconnected);
    assert!(monitor.handle_device_event(DeviceEvent::remove(&path)).await.is_none());

    monitor.dispatch_pending().await;
    assert_eq!(log.kinds(), vec![CameraEventKind::Connected, CameraEventKind::Disconnected]);
    assert!(monitor.get_connected_cameras().await.is_empty());
    assert!(monitor.get_effective_capability_metadata(&path).await.is_none());
}

#[tokio::test]
async fn test_devices_outside_range_are_never_registered() {
    let dev = FakeDevDir::new();
    dev.plug(2);
    let far = dev.plug(10);
    let prober = ScriptedProber::new();
    let (monitor, log) = manual_monitor(manual_options(&dev), prober.clone()).await;

    let cycle = monitor.poll_once().await;
    assert_eq!(
        cycle,
        PollCycle::Completed {
            connected: 0,
            disconnected: 0,
            reprobed: 0
        }
    );
    assert!(monitor.handle_device_event(DeviceEvent::add(&far)).await.is_none());

    monitor.dispatch_pending().await;
    assert_eq!(log.len(), 0);
    assert_eq!(prober.calls(), 0);
    assert!(monitor.get_connected_cameras().await.is_empty());

    let stats = monitor.get_monitor_stats().await;
    assert_eq!(stats.events_processed, 1);
    assert_eq!(stats.events_filtered, 1);
}

#[tokio::test]
async fn test_non_video_records_are_filtered() {
    let dev = FakeDevDir::new();
    let path = dev.plug(0);
    let (monitor, _log) = manual_monitor(manual_options(&dev), ScriptedProber::new()).await;

    let record = DeviceEvent {
        subsystem: "sound".to_string(),
        ..DeviceEvent::add(&path)
    };
    assert!(monitor.handle_device_event(record).await.is_none());
    assert!(monitor
        .handle_device_event(DeviceEvent::add(dev.path().join("media0").to_string_lossy()))
        .await
        .is_none());
    assert_eq!(monitor.get_monitor_stats().await.events_filtered, 2);
}

#[tokio::test]
async fn test_non_video_records_do_not_hold_off_polling() {
    let dev = FakeDevDir::new();
    let path = dev.plug(0);
    let (monitor, _log) = manual_monitor(manual_options(&dev), ScriptedProber::new()).await;

    for node in ["/dev/snd/controlC0", "/dev/input/event3"] {
        let record = DeviceEvent {
            subsystem: "sound".to_string(),
            ..DeviceEvent::add(node)
        };
        monitor.handle_device_event(record).await;
    }

    let cycle = monitor.poll_once().await;
    assert_eq!(
        cycle,
        PollCycle::Completed {
            connected: 1,
            disconnected: 0,
            reprobed: 0,
        }
    );
    assert!(monitor.get_connected_cameras().await.contains_key(&path));

    let stats = monitor.get_monitor_stats().await;
    assert_eq!(stats.events_processed, 2);
    assert_eq!(stats.polling_cycles_skipped, 0);
    assert!(stats.last_event_age_ms.is_none());
}

#[tokio::test]
async fn test_reconnection_resets_confirmation() {
    let dev = FakeDevDir::new();
    let path = dev.plug(0);
    let (monitor, log) = manual_monitor(manual_options(&dev), ScriptedProber::new()).await;

    for _ in 0..3 {
        monitor.poll_once().await;
    }
    assert_eq!(
        monitor
            .get_effective_capability_metadata(&path)
            .await
            .unwrap()
            .validation_status,
        ValidationStatus::Confirmed
    );

    dev.unplug(0);
    assert_eq!(
        monitor.poll_once().await,
        PollCycle::Completed {
            connected: 0,
            disconnected: 1,
            reprobed: 0
        }
    );
    assert!(monitor.get_effective_capability_metadata(&path).await.is_none());

    dev.plug(0);
    monitor.poll_once().await;
    let metadata = monitor.get_effective_capability_metadata(&path).await.unwrap();
    assert_eq!(metadata.validation_status, ValidationStatus::Provisional);
    assert_eq!(metadata.consecutive_successes, 1);

    monitor.dispatch_pending().await;
    assert_eq!(
        log.kinds(),
        vec![
            CameraEventKind::Connected,
            CameraEventKind::Disconnected,
            CameraEventKind::Connected
        ]
    );
}

#[tokio::test]
async fn test_reads_do_not_drift_without_probes() {
    let dev = FakeDevDir::new();
    let path = dev.plug(0);
    let (monitor, _log) = manual_monitor(manual_options(&dev), ScriptedProber::new()).await;

    monitor.poll_once().await;
    monitor.poll_once().await;

    let first = monitor.get_effective_capability_metadata(&path).await;
    let second = monitor.get_effective_capability_metadata(&path).await;
    assert_eq!(first, second);
    assert_eq!(monitor.get_connected_cameras().await, monitor.get_connected_cameras().await);
}

#[tokio::test]
async fn test_identity_change_on_reprobe_emits_status_changed() {
    let dev = FakeDevDir::new();
    let path = dev.plug(0);
    let prober = ScriptedProber::new();
    let (monitor, log) = manual_monitor(manual_options(&dev), prober.clone()).await;

    monitor.poll_once().await;
    prober.push(hd_probe(&path).with_identity("HD Webcam (rev 2)", "uvcvideo"));
    monitor.poll_once().await;
    monitor.dispatch_pending().await;

    assert_eq!(log.kinds(), vec![CameraEventKind::Connected, CameraEventKind::StatusChanged]);
    let cameras = monitor.get_connected_cameras().await;
    assert_eq!(cameras[&path].name, "HD Webcam (rev 2)");
}

#[tokio::test]
async fn test_reprobe_can_be_disabled() {
    let dev = FakeDevDir::new();
    let path = dev.plug(0);
    let options = MonitorOptions {
        reprobe_known_devices: false,
        ..manual_options(&dev)
    };
    let prober = ScriptedProber::new();
    let (monitor, _log) = manual_monitor(options, prober.clone()).await;

    for _ in 0..3 {
        monitor.poll_once().await;
    }
    assert_eq!(prober.calls(), 1);
    let metadata = monitor.get_effective_capability_metadata(&path).await.unwrap();
    assert_eq!(metadata.validation_status, ValidationStatus::Provisional);
}

#[tokio::test]
async fn test_change_record_refreshes_known_device() {
    let dev = FakeDevDir::new();
    let path = dev.plug(0);
    let other = dev.plug(1);
    let (monitor, log) = manual_monitor(manual_options(&dev), ScriptedProber::new()).await;

    monitor.handle_device_event(DeviceEvent::add(&path)).await;
    let changed = monitor.handle_device_event(DeviceEvent::change(&path)).await.unwrap();
    assert_eq!(changed.kind, CameraEventKind::StatusChanged);

    // Change for a device that was never added is dropped
    assert!(monitor.handle_device_event(DeviceEvent::change(&other)).await.is_none());

    // Capability history survives the change
    let metadata = monitor.get_effective_capability_metadata(&path).await.unwrap();
    assert_eq!(metadata.consecutive_successes, 1);

    dev.unplug(0);
    let gone = monitor.handle_device_event(DeviceEvent::change(&path)).await.unwrap();
    assert_eq!(gone.kind, CameraEventKind::Disconnected);

    monitor.dispatch_pending().await;
    assert_eq!(
        log.kinds(),
        vec![
            CameraEventKind::Connected,
            CameraEventKind::StatusChanged,
            CameraEventKind::Disconnected
        ]
    );
}

#[tokio::test]
async fn test_remove_during_probe_discards_the_add() {
    let dev = FakeDevDir::new();
    let path = dev.plug(0);
    let (prober, mut started, release) = GatedProber::new();
    let monitor = Arc::new(
        HybridCameraMonitor::with_components(manual_options(&dev), prober, Arc::new(NoopEventSource)).unwrap(),
    );
    let log = EventLog::default();
    monitor.add_event_callback(log.handler()).await;

    let adder = {
        let monitor = monitor.clone();
        let path = path.clone();
        tokio::spawn(async move { monitor.handle_device_event(DeviceEvent::add(path)).await })
    };

    assert_eq!(started.recv().await.unwrap(), path);
    assert!(monitor.handle_device_event(DeviceEvent::remove(&path)).await.is_none());
    release.send(()).unwrap();

    assert!(adder.await.unwrap().is_none());
    monitor.dispatch_pending().await;
    assert_eq!(log.len(), 0);
    assert!(monitor.get_connected_cameras().await.is_empty());
    assert!(monitor.get_effective_capability_metadata(&path).await.is_none());
}

#[tokio::test]
async fn test_concurrent_adds_register_independently() {
    let dev = FakeDevDir::new();
    let first = dev.plug(0);
    let second = dev.plug(1);
    let (prober, mut started, release) = GatedProber::new();
    let monitor = Arc::new(
        HybridCameraMonitor::with_components(manual_options(&dev), prober, Arc::new(NoopEventSource)).unwrap(),
    );

    let mut adds = Vec::new();
    for path in [first.clone(), second.clone()] {
        let monitor = monitor.clone();
        adds.push(tokio::spawn(async move { monitor.handle_device_event(DeviceEvent::add(path)).await }));
    }

    // Both probes run at the same time
    started.recv().await.unwrap();
    started.recv().await.unwrap();
    release.send(()).unwrap();
    release.send(()).unwrap();

    for add in adds {
        let event = add.await.unwrap().unwrap();
        assert_eq!(event.kind, CameraEventKind::Connected);
    }
    let cameras = monitor.get_connected_cameras().await;
    assert!(cameras.contains_key(&first));
    assert!(cameras.contains_key(&second));
}

#[tokio::test]
async fn test_event_add_during_poll_is_not_reported_gone() {
    let dev = FakeDevDir::new();
    let first = dev.plug(0);
    let (prober, mut started, release) = GatedProber::new();
    let monitor = Arc::new(
        HybridCameraMonitor::with_components(manual_options(&dev), prober, Arc::new(NoopEventSource)).unwrap(),
    );
    let log = EventLog::default();
    monitor.add_event_callback(log.handler()).await;

    // The poll lists the directory while only video0 exists
    let poll = {
        let monitor = monitor.clone();
        tokio::spawn(async move { monitor.poll_once().await })
    };
    assert_eq!(started.recv().await.unwrap(), first);

    // video1 appears after the listing and arrives through the event path
    let second = dev.plug(1);
    let add = {
        let monitor = monitor.clone();
        let second = second.clone();
        tokio::spawn(async move { monitor.handle_device_event(DeviceEvent::add(second)).await })
    };
    assert_eq!(started.recv().await.unwrap(), second);
    release.send(()).unwrap();
    release.send(()).unwrap();

    assert_eq!(
        poll.await.unwrap(),
        PollCycle::Completed {
            connected: 1,
            disconnected: 0,
            reprobed: 0,
        }
    );
    assert_eq!(add.await.unwrap().unwrap().kind, CameraEventKind::Connected);

    monitor.dispatch_pending().await;
    assert_eq!(log.kinds(), vec![CameraEventKind::Connected, CameraEventKind::Connected]);
    let cameras = monitor.get_connected_cameras().await;
    assert!(cameras.contains_key(&first));
    assert!(cameras.contains_key(&second));
}

#[tokio::test]
async fn test_enumeration_failure_backs_off_and_recovers() {
    let dev = FakeDevDir::new();
    let missing = dev.path().join("missing");
    let options = MonitorOptions {
        device_dir: missing.clone(),
        ..manual_options(&dev)
    };
    let (monitor, _log) = manual_monitor(options, ScriptedProber::new()).await;

    assert!(matches!(monitor.poll_once().await, PollCycle::Failed { .. }));
    assert!(matches!(monitor.poll_once().await, PollCycle::Failed { .. }));

    let stats = monitor.get_monitor_stats().await;
    assert_eq!(stats.polling_failure_count, 2);
    assert_eq!(stats.total_polling_failures, 2);
    assert!(stats.last_enumeration_error.is_some());

    std::fs::create_dir(&missing).unwrap();
    std::fs::write(missing.join("video0"), b"").unwrap();
    assert_eq!(
        monitor.poll_once().await,
        PollCycle::Completed {
            connected: 1,
            disconnected: 0,
            reprobed: 0
        }
    );

    let stats = monitor.get_monitor_stats().await;
    assert_eq!(stats.polling_failure_count, 0);
    assert_eq!(stats.total_polling_failures, 2);
}

#[tokio::test]
async fn test_fresh_events_skip_polling_and_stretch_interval() {
    let dev = FakeDevDir::new();
    let path = dev.plug(0);
    let (monitor, _log) = manual_monitor(manual_options(&dev), ScriptedProber::new()).await;

    monitor.handle_device_event(DeviceEvent::add(&path)).await;
    assert_eq!(monitor.poll_once().await, PollCycle::Skipped);

    let stats = monitor.get_monitor_stats().await;
    assert_eq!(stats.polling_cycles_skipped, 1);
    assert_eq!(stats.polling_cycles, 0);
    assert_eq!(stats.current_poll_interval_ms, 6000);
    assert!(stats.last_event_age_ms.is_some());
}

#[tokio::test]
async fn test_stale_events_shrink_interval() {
    let dev = FakeDevDir::new();
    let (monitor, _log) = manual_monitor(manual_options(&dev), ScriptedProber::new()).await;

    monitor.poll_once().await;
    let stats = monitor.get_monitor_stats().await;
    assert_eq!(stats.polling_cycles, 1);
    assert_eq!(stats.current_poll_interval_ms, 4000);
    assert_eq!(stats.adaptive_adjustments, 1);
    assert!(stats.last_event_age_ms.is_none());
}

#[tokio::test]
async fn test_failing_callbacks_do_not_block_others() {
    let dev = FakeDevDir::new();
    dev.plug(0);
    let (monitor, log) = manual_monitor(manual_options(&dev), ScriptedProber::new()).await;
    monitor
        .add_event_callback(|_: &CameraEvent| -> anyhow::Result<()> { anyhow::bail!("consumer offline") })
        .await;

    monitor.poll_once().await;
    monitor.dispatch_pending().await;

    assert_eq!(log.len(), 1);
    let stats = monitor.get_monitor_stats().await;
    assert_eq!(stats.callback_failures, 1);
    assert_eq!(stats.events_emitted, 1);
}

#[tokio::test]
async fn test_start_and_stop_are_idempotent_with_channel_source() {
    let dev = FakeDevDir::new();
    let path = dev.plug(0);
    let (source, tx) = ChannelEventSource::new();
    let options = MonitorOptions {
        enable_event_source: true,
        ..manual_options(&dev)
    };
    let monitor = HybridCameraMonitor::with_components(options, ScriptedProber::new(), Arc::new(source)).unwrap();
    let log = EventLog::default();
    monitor.add_event_callback(log.handler()).await;

    assert_ok!(monitor.start().await);
    assert_ok!(monitor.start().await);
    assert!(monitor.is_running());

    tx.send(DeviceEvent::add(&path)).await.unwrap();
    log.wait_for(1).await;
    tx.send(DeviceEvent::remove(&path)).await.unwrap();
    log.wait_for(2).await;
    assert_eq!(log.kinds(), vec![CameraEventKind::Connected, CameraEventKind::Disconnected]);

    let stats = monitor.get_monitor_stats().await;
    assert!(stats.running);
    assert!(stats.event_source_available);
    assert_eq!(stats.event_source_name, "channel");
    assert_eq!(stats.events_processed, 2);

    assert_ok!(monitor.stop().await);
    assert_ok!(monitor.stop().await);
    assert!(!monitor.is_running());
    assert!(!monitor.get_monitor_stats().await.running);
}

#[tokio::test]
async fn test_poller_worker_discovers_devices_without_events() {
    let dev = FakeDevDir::new();
    dev.plug(1);
    let options = MonitorOptions {
        initial_poll_delay: Duration::ZERO,
        ..manual_options(&dev)
    };
    let monitor =
        HybridCameraMonitor::with_components(options, ScriptedProber::new(), Arc::new(NoopEventSource)).unwrap();
    let log = EventLog::default();
    monitor.add_event_callback(log.handler()).await;

    assert_ok!(monitor.start().await);
    log.wait_for(1).await;
    assert_eq!(log.kinds(), vec![CameraEventKind::Connected]);

    let stats = monitor.get_monitor_stats().await;
    assert!(!stats.event_source_available);
    assert_eq!(stats.event_source_name, "none");
    assert!(stats.polling_cycles >= 1);

    assert_ok!(monitor.stop().await);
}

#[tokio::test]
async fn test_invalid_options_are_rejected_at_construction() {
    let dev = FakeDevDir::new();
    let options = MonitorOptions {
        device_range: vec![],
        ..manual_options(&dev)
    };
    let result = HybridCameraMonitor::with_components(options, ScriptedProber::new(), Arc::new(NoopEventSource));
    let Err(err) = result else {
        panic!("empty device range was accepted");
    };
    assert_eq!(err.config_field(), Some("device_range"));
}
