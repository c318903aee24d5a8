//! Settings loading and the application run loop

use std::time::Duration;

use camwatch::app::run::run;
use camwatch::filesys::file::File;
use camwatch::storage::settings::Settings;
use camwatch::HybridCameraMonitor;
use tokio::sync::oneshot;
use tokio_test::assert_ok;

#[tokio::test]
async fn test_settings_file_builds_a_monitor() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let json = format!(
        r#"{{
            "device_dir": "{}",
            "device_range": [0, 1, 2],
            "confirmation_threshold": 4,
            "poll_interval_secs": 2,
            "enable_event_source": false
        }}"#,
        dir.path().display()
    );
    std::fs::write(&path, json).unwrap();

    let settings = Settings::load(&File::new(&path)).await.unwrap();
    let options = settings.to_options().unwrap();
    assert_eq!(options.monitor.device_range, vec![0, 1, 2]);
    assert_eq!(options.monitor.poll_interval, Duration::from_secs(2));

    let monitor = HybridCameraMonitor::new(options.monitor).unwrap();
    assert_eq!(monitor.options().confirmation_threshold, 4);
    assert_eq!(monitor.get_monitor_stats().await.event_source_name, "none");
}

#[tokio::test]
async fn test_malformed_settings_are_configuration_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"reprobe_known_devices": 1}"#).unwrap();

    let err = Settings::load(&File::new(&path)).await.unwrap_err();
    assert!(err.config_field().is_some(), "{}", err);

    let err = Settings::from_json(r#"{"min_poll_interval_secs": 10, "max_poll_interval_secs": 5}"#)
        .unwrap()
        .to_options()
        .unwrap_err();
    assert_eq!(err.config_field(), Some("min_poll_interval"));
}

#[tokio::test]
async fn test_run_stops_on_shutdown_signal() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        device_dir: dir.path().to_path_buf(),
        enable_event_source: false,
        probe_tool: "camwatch-test-missing-tool".to_string(),
        ..Default::default()
    };
    let options = settings.to_options().unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(run(options, async move {
        let _ = stop_rx.await;
    }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    stop_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap();
    assert_ok!(result);
}
