use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use runtrack_core::physics::EARTH_RADIUS_KM;
use runtrack_core::{
    ElevationClient, ElevationError, ElevationProvider, Fix, ManualClock, SensorAdapter,
    SensorOptions, Session, SessionConfig, SessionStateKind, StaticElevationProvider,
    StaticLocationProvider, Tracker, TrackerConfig,
};

const DEG_PER_KM: f64 = 180.0 / (PI * EARTH_RADIUS_KM);

fn run_fix(i: u64) -> Fix {
    // 25 m hvert 10. sekund
    Fix::new(0.0, i as f64 * 0.025 * DEG_PER_KM, i * 10_000).with_accuracy(5.0)
}

fn session() -> Session {
    Session::with_clock(SessionConfig::default(), Arc::new(ManualClock::new(0))).expect("session")
}

#[test]
fn test_commands_are_applied_in_order() {
    let tracker = Tracker::spawn(session(), &TrackerConfig::default());
    assert_eq!(tracker.snapshot().state, SessionStateKind::Idle);

    tracker.start();
    for i in 0..=60 {
        assert!(tracker.push_fix(run_fix(i)));
    }
    let summary = tracker.stop().expect("summary");

    assert_eq!(summary.state, SessionStateKind::Stopped);
    assert_eq!(summary.samples, 61);
    assert_eq!(summary.laps.len(), 1);
    assert!((summary.totals.distance_km - 1.5).abs() < 1e-6);

    let snap = tracker.snapshot();
    assert_eq!(snap.state, SessionStateKind::Stopped);
    assert_eq!(snap.samples, 61);
    assert_eq!(snap.laps.len(), 1);

    let session = tracker.shutdown().expect("session back");
    assert_eq!(session.samples().len(), 61);
}

#[test]
fn test_readers_never_see_samples_go_backwards() {
    let config = TrackerConfig { queue_capacity: 4, ..Default::default() };
    let tracker = Tracker::spawn(session(), &config);
    tracker.start();

    let sink = tracker.fix_sink();
    let producer = thread::spawn(move || {
        for i in 0..200 {
            assert!(sink.push(run_fix(i)));
        }
    });

    let mut last = 0;
    while !producer.is_finished() {
        let snap = tracker.snapshot();
        assert!(snap.samples >= last);
        last = snap.samples;
    }
    producer.join().expect("producer");

    let summary = tracker.stop().expect("summary");
    assert_eq!(summary.samples, 200);
    assert_eq!(summary.rejected_samples, 0);
}

#[test]
fn test_pause_and_reset_through_tracker() {
    let tracker = Tracker::spawn(session(), &TrackerConfig::default());
    tracker.start();
    tracker.push_fix(run_fix(0));
    tracker.pause();
    tracker.push_fix(run_fix(1));
    tracker.resume();
    tracker.push_fix(run_fix(2));
    let summary = tracker.stop().expect("summary");
    assert_eq!(summary.samples, 2);

    let old_id = summary.session_id;
    tracker.reset();
    // stop fra Idle gir bare rapport, og kommandoen synkroniserer med tråden
    let after = tracker.stop().expect("summary");
    assert_eq!(after.state, SessionStateKind::Idle);
    assert_eq!(after.samples, 0);
    assert_ne!(after.session_id, old_id);
}

#[test]
fn test_elevation_results_flow_back() {
    let client = Arc::new(ElevationClient::new(Arc::new(StaticElevationProvider {
        elevation_m: Some(42.0),
    })));
    let config = TrackerConfig { elevation_batch: 5, ..Default::default() };
    let tracker = Tracker::spawn_with_elevation(session(), &config, Some(client));

    tracker.start();
    for i in 0..12 {
        tracker.push_fix(run_fix(i));
    }
    tracker.stop().expect("summary");

    let deadline = Instant::now() + Duration::from_secs(3);
    while tracker.snapshot().samples_with_elevation < 12 {
        assert!(Instant::now() < deadline, "elevation never arrived");
        thread::sleep(Duration::from_millis(10));
    }

    let session = tracker.shutdown().expect("session back");
    assert!(session.samples().iter().all(|s| s.elevation_m == Some(42.0)));
    assert_eq!(session.totals().elevation_gain_m, 0.0);
}

/// Treg høydetjeneste: 300 ms per kall, alltid 999 m.
#[derive(Default)]
struct SlowProvider {
    done: AtomicUsize,
}

impl ElevationProvider for SlowProvider {
    fn lookup(&self, points: &[(f64, f64)]) -> Result<Vec<f64>, ElevationError> {
        thread::sleep(Duration::from_millis(300));
        self.done.fetch_add(1, Ordering::SeqCst);
        Ok(vec![999.0; points.len()])
    }
}

#[test]
fn test_elevation_for_reset_session_is_dropped() {
    let provider = Arc::new(SlowProvider::default());
    let client = Arc::new(ElevationClient::new(provider.clone()));
    let config = TrackerConfig { elevation_batch: 3, ..Default::default() };
    let tracker = Tracker::spawn_with_elevation(session(), &config, Some(client));

    tracker.start();
    for i in 0..3 {
        tracker.push_fix(run_fix(i));
    }
    // oppslaget for de tre første er i gang når økten nullstilles
    tracker.reset();
    tracker.start();
    tracker.push_fix(Fix::new(45.0, 7.0, 0).with_accuracy(5.0));
    tracker.push_fix(Fix::new(45.0002, 7.0, 10_000).with_accuracy(5.0));

    let deadline = Instant::now() + Duration::from_secs(3);
    while provider.done.load(Ordering::SeqCst) < 1 {
        assert!(Instant::now() < deadline, "lookup never finished");
        thread::sleep(Duration::from_millis(10));
    }
    thread::sleep(Duration::from_millis(100));

    let session = tracker.shutdown().expect("session back");
    assert_eq!(session.samples().len(), 2);
    assert!(session.samples().iter().all(|s| s.elevation_m.is_none()));
}

#[test]
fn test_sensor_watch_feeds_tracker() {
    let stream: Vec<Fix> = (0..30).map(run_fix).collect();
    let provider = Arc::new(StaticLocationProvider::new().with_stream(stream));
    let sensor = SensorAdapter::new(provider);

    let tracker = Tracker::spawn(session(), &TrackerConfig::default());
    tracker.start();
    let sink = tracker.fix_sink();
    let handle = sensor
        .start_watch(move |fix| { sink.push(fix); }, &SensorOptions::default())
        .expect("watch");

    let deadline = Instant::now() + Duration::from_secs(3);
    while tracker.snapshot().samples < 30 {
        assert!(Instant::now() < deadline, "fixes never arrived");
        thread::sleep(Duration::from_millis(10));
    }
    sensor.stop_watch(&handle);

    let summary = tracker.stop().expect("summary");
    assert_eq!(summary.samples, 30);
}

#[test]
fn test_drop_stops_worker() {
    let tracker = Tracker::spawn(session(), &TrackerConfig::default());
    tracker.start();
    tracker.push_fix(run_fix(0));
    drop(tracker);
}
