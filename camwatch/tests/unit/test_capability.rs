//! Capability confirmation over sequences of probes

use camwatch::capability::state::{CapabilityPolicy, ValidationStatus};
use camwatch::capability::tracker::CapabilityTracker;
use camwatch::probe::parser::parse_probe_output;
use camwatch::probe::result::CapabilityProbeResult;

const PATH: &str = "/dev/video0";

fn probe(resolution: &str, fps: &str) -> CapabilityProbeResult {
    parse_probe_output(
        PATH,
        &format!(
            "Pixel Format: 'MJPG'\nSize: Discrete {}\nInterval: Discrete ({}.000 fps)\n",
            resolution, fps
        ),
    )
}

fn failure() -> CapabilityProbeResult {
    CapabilityProbeResult::failure(PATH, false, "Device or resource busy")
}

fn tracker(threshold: u32) -> CapabilityTracker {
    CapabilityTracker::new(CapabilityPolicy {
        confirmation_threshold: threshold,
        ..Default::default()
    })
}

#[test]
fn test_most_frequent_values_win() {
    let mut tracker = tracker(3);
    let observations = [
        ("1920x1080", "30"),
        ("1920x1080", "30"),
        ("1280x720", "25"),
        ("1920x1080", "30"),
        ("640x480", "60"),
    ];
    for (resolution, fps) in observations {
        tracker.update(PATH, probe(resolution, fps));
    }

    let metadata = tracker.metadata(PATH).unwrap();
    assert_eq!(metadata.validation_status, ValidationStatus::Confirmed);
    assert_eq!(metadata.resolution.as_deref(), Some("1920x1080"));
    assert_eq!(metadata.fps, Some(30));
    assert_eq!(metadata.all_resolutions, vec!["1920x1080", "1280x720", "640x480"]);
    assert_eq!(metadata.all_frame_rates, vec!["30", "25", "60"]);
}

#[test]
fn test_threshold_boundary() {
    for threshold in [2, 3, 5] {
        let mut tracker = tracker(threshold);
        for _ in 0..threshold - 1 {
            tracker.update(PATH, probe("640x480", "30"));
        }
        assert_eq!(
            tracker.metadata(PATH).unwrap().validation_status,
            ValidationStatus::Provisional
        );

        let transition = tracker.update(PATH, probe("640x480", "30"));
        assert!(transition.changed());
        assert_eq!(transition.current, ValidationStatus::Confirmed);
    }
}

#[test]
fn test_fail_then_recover_restarts_streak() {
    let mut tracker = tracker(3);
    tracker.update(PATH, probe("640x480", "30"));
    tracker.update(PATH, probe("640x480", "30"));
    tracker.update(PATH, failure());

    let state = tracker.get(PATH).unwrap();
    assert_eq!(state.consecutive_successes(), 0);
    assert_eq!(state.consecutive_failures(), 1);
    assert_eq!(state.last_error(), Some("Device or resource busy"));

    tracker.update(PATH, probe("1280x720", "15"));
    let metadata = tracker.metadata(PATH).unwrap();
    assert_eq!(metadata.validation_status, ValidationStatus::Provisional);
    assert_eq!(metadata.consecutive_successes, 1);
    assert_eq!(metadata.consecutive_failures, 0);
    assert_eq!(metadata.resolution.as_deref(), Some("1280x720"));
}

#[test]
fn test_failures_only_never_produce_data() {
    let mut tracker = tracker(2);
    for _ in 0..5 {
        tracker.update(PATH, failure());
    }
    let metadata = tracker.metadata(PATH).unwrap();
    assert_eq!(metadata.validation_status, ValidationStatus::Unknown);
    assert!(metadata.resolution.is_none());
    assert!(metadata.fps.is_none());
    assert_eq!(metadata.consecutive_failures, 5);
}

#[test]
fn test_demotion_policy_drops_confirmation() {
    let mut tracker = CapabilityTracker::new(CapabilityPolicy {
        confirmation_threshold: 2,
        demotion_failure_threshold: Some(2),
    });
    tracker.update(PATH, probe("640x480", "30"));
    tracker.update(PATH, probe("640x480", "30"));
    tracker.update(PATH, failure());
    assert_eq!(
        tracker.metadata(PATH).unwrap().validation_status,
        ValidationStatus::Confirmed
    );

    tracker.update(PATH, failure());
    let metadata = tracker.metadata(PATH).unwrap();
    assert_eq!(metadata.validation_status, ValidationStatus::Provisional);
    assert_eq!(metadata.resolution.as_deref(), Some("640x480"));
}
