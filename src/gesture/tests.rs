use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

fn spike(strength: f64, timestamp_ms: u64) -> GestureSample {
    GestureSample::new(0.0, 0.0, STANDARD_GRAVITY + strength, timestamp_ms)
}

#[test]
fn test_magnitude_subtracts_gravity() {
    let sample = GestureSample::new(3.0, 4.0, 0.0, 0);
    assert!((sample.magnitude(STANDARD_GRAVITY) - (5.0 - STANDARD_GRAVITY)).abs() < 1e-9);

    assert!(GestureSample::at_rest(0).magnitude(STANDARD_GRAVITY).abs() < 1e-9);
}

#[test]
fn test_spikes_inside_cooldown_fire_once() {
    let mut filter = ShakeFilter::new(ShakeSettings::default());

    let first = GestureSample::new(0.0, 0.0, 15.0 + STANDARD_GRAVITY, 0);
    let second = GestureSample::new(0.0, 0.0, 16.0 + STANDARD_GRAVITY, 500);

    assert!(filter.observe(&first).is_some());
    assert!(filter.observe(&second).is_none());
}

#[test]
fn test_quiet_samples_never_fire() {
    let mut filter = ShakeFilter::new(ShakeSettings::default());

    for t in (0..10_000).step_by(100) {
        assert!(filter.observe(&spike(2.4, t)).is_none());
        assert!(filter.observe(&GestureSample::at_rest(t)).is_none());
    }
}

#[test]
fn test_free_fall_counts_as_shake() {
    let mut filter = ShakeFilter::new(ShakeSettings::default());
    let event = filter.observe(&GestureSample::new(0.0, 0.0, 0.0, 10)).unwrap();

    assert!(event.magnitude < -2.5);
}

#[test]
fn test_cooldown_boundary_is_exclusive() {
    let mut filter = ShakeFilter::new(ShakeSettings::default());

    assert!(filter.observe(&spike(10.0, 1_000)).is_some());
    assert!(filter.observe(&spike(10.0, 3_000)).is_none());
    assert!(filter.observe(&spike(10.0, 3_001)).is_some());
}

#[test]
fn test_consecutive_firings_respect_cooldown() {
    let settings = ShakeSettings {
        threshold: 2.5,
        cooldown: Duration::from_millis(2_000),
        gravity: STANDARD_GRAVITY,
    };
    let mut filter = ShakeFilter::new(settings);

    // Strong spikes every 70 ms, with quiet samples mixed in
    let mut fired = Vec::new();
    for i in 0..400u64 {
        let t = i * 70;
        let sample = if i % 3 == 0 {
            GestureSample::at_rest(t)
        } else {
            spike(5.0 + (i % 7) as f64, t)
        };
        if let Some(event) = filter.observe(&sample) {
            fired.push(event.timestamp_ms);
        }
    }

    assert!(fired.len() > 1);
    for pair in fired.windows(2) {
        assert!(pair[1] - pair[0] >= 2_000);
    }
}

#[test]
fn test_custom_threshold_and_cooldown() {
    let settings = ShakeSettings {
        threshold: 8.0,
        cooldown: Duration::from_millis(100),
        gravity: STANDARD_GRAVITY,
    };
    let mut filter = ShakeFilter::new(settings);

    assert!(filter.observe(&spike(5.0, 0)).is_none());
    assert!(filter.observe(&spike(9.0, 10)).is_some());
    assert!(filter.observe(&spike(9.0, 111)).is_some());
}

#[test]
fn test_idle_detector_ignores_samples() {
    let detector = GestureDetector::default();

    assert_eq!(detector.state(), GestureState::Idle);
    assert!(detector.process_sample(&spike(20.0, 0)).is_none());
}

#[tokio::test]
async fn test_missing_sensor_leaves_detector_inert() {
    let detector = GestureDetector::default();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);

    let armed = detector.arm(&NoSensor, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(!armed);
    assert_eq!(detector.state(), GestureState::Idle);
    assert!(detector.process_sample(&spike(20.0, 0)).is_none());
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_armed_detector_fires_callback_from_sensor() {
    let detector = GestureDetector::default();
    let sensor = ChannelSensor::new(16);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    assert!(detector.arm(&sensor, move |event| {
        let _ = tx.send(event);
    }));
    assert_eq!(detector.state(), GestureState::Armed);

    sensor.emit(spike(15.0, 0));
    sensor.emit(spike(16.0, 500));
    sensor.emit(spike(12.0, 2_600));

    let first = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    let second = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();

    assert_eq!(first.timestamp_ms, 0);
    assert_eq!(second.timestamp_ms, 2_600);
    assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err());
}

#[tokio::test]
async fn test_disarm_stops_delivery_and_is_idempotent() {
    let detector = GestureDetector::default();
    let sensor = ChannelSensor::new(16);
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);

    detector.arm(&sensor, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    detector.disarm();
    detector.disarm();
    assert_eq!(detector.state(), GestureState::Idle);

    // Give the cancelled task a chance to exit before emitting
    sleep(Duration::from_millis(20)).await;
    assert_eq!(sensor.emit(spike(20.0, 10_000)), 0);
    sleep(Duration::from_millis(20)).await;

    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_callback_may_disarm_detector() {
    let detector = GestureDetector::default();
    let sensor = ChannelSensor::new(16);
    let handle = detector.clone();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);

    detector.arm(&sensor, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        handle.disarm();
    });

    assert!(detector.process_sample(&spike(20.0, 0)).is_some());
    assert_eq!(detector.state(), GestureState::Idle);
    assert!(detector.process_sample(&spike(20.0, 5_000)).is_none());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}
