use std::f64::consts::PI;
use std::sync::mpsc;
use std::sync::Arc;

use runtrack_core::physics::EARTH_RADIUS_KM;
use runtrack_core::{
    ChannelObserver, DistanceUnit, Fix, ManualClock, RejectReason, SampleOutcome, Session,
    SessionConfig, SessionEvent, SessionStateKind, SignalQuality, TrackError,
};

/// Lengdegrader per km langs ekvator.
const DEG_PER_KM: f64 = 180.0 / (PI * EARTH_RADIUS_KM);

fn session_with(config: SessionConfig) -> (Session, ManualClock) {
    let clock = ManualClock::new(0);
    let session = Session::with_clock(config, Arc::new(clock.clone())).expect("valid config");
    (session, clock)
}

fn fix_at(km: f64, t_s: u64) -> Fix {
    Fix::new(0.0, km * DEG_PER_KM, t_s * 1000).with_accuracy(5.0)
}

/// Jevn løping langs ekvator: `step_km` hvert `step_s` sekund.
fn feed_run(session: &mut Session, clock: &ManualClock, total_km: f64, step_km: f64, step_s: u64) {
    let steps = (total_km / step_km).round() as u64;
    for i in 0..=steps {
        clock.set(i * step_s * 1000);
        let out = session.add_sample(fix_at(i as f64 * step_km, i * step_s));
        assert!(out.is_accepted(), "step {i}: {out:?}");
    }
}

#[test]
fn test_three_fixes_close_one_lap() {
    // 1 km på 10 s er langt over løpetaket; hev taket for scenarioet
    let config = SessionConfig { max_speed_kmh: 1000.0, ..Default::default() };
    let (mut s, clock) = session_with(config);
    s.start();

    s.add_sample(Fix::new(0.0, 0.0, 0));
    clock.set(5_000);
    s.add_sample(Fix::new(0.0, 0.0045, 5_000));
    clock.set(10_000);
    s.add_sample(Fix::new(0.0, 0.009, 10_000));

    assert_eq!(s.laps().len(), 1);
    let lap = &s.laps()[0];
    assert_eq!(lap.index, 1);
    assert_eq!(lap.start_index, 0);
    assert_eq!(lap.end_index, 2);
    assert!((lap.distance_km - 1.00075).abs() < 1e-3, "got {}", lap.distance_km);
    assert_eq!(lap.duration_s, 10.0);
    assert!((s.totals().distance_km - 1.00075).abs() < 1e-3);
}

#[test]
fn test_one_km_fixes_emit_lap_per_fix() {
    let config = SessionConfig { max_speed_kmh: 1000.0, ..Default::default() };
    let (mut s, clock) = session_with(config);
    let (tx, rx) = mpsc::channel();
    s.subscribe(Box::new(ChannelObserver::new(tx)));
    s.start();

    let fixes = [(0.0, 0), (0.009, 10_000), (0.018, 20_000)];
    let mut laps_after = Vec::new();
    for (lon, t) in fixes {
        clock.set(t);
        let out = s.add_sample(Fix::new(0.0, lon, t).with_accuracy(5.0));
        assert!(out.is_accepted());
        laps_after.push(s.laps().len());
    }
    assert_eq!(laps_after, vec![0, 1, 2]);

    for lap in s.laps() {
        assert!((lap.distance_km - 1.00075).abs() < 1e-3);
        assert_eq!(lap.duration_s, 10.0);
        let pace = lap.avg_pace_s_per_km.expect("lap pace");
        assert!((pace - 9.99).abs() < 0.01, "got {pace}");
    }
    assert_eq!(s.laps()[1].start_index, 2);
    assert_eq!(s.laps()[1].end_index, 2);

    let splits: Vec<_> = rx
        .try_iter()
        .filter_map(|e| match e {
            SessionEvent::Split(lap) => Some(lap.index),
            _ => None,
        })
        .collect();
    assert_eq!(splits, vec![1, 2]);
}

#[test]
fn test_unrealistic_speed_is_rejected() {
    let (mut s, clock) = session_with(SessionConfig::default());
    s.start();
    s.add_sample(Fix::new(0.0, 0.0, 0));
    clock.set(10_000);
    // ~0.667 km på 10 s ≈ 240 km/t
    let out = s.add_sample(Fix::new(0.0, 0.006, 10_000));

    assert_eq!(out, SampleOutcome::Rejected(RejectReason::TooFast));
    assert_eq!(s.totals().distance_km, 0.0);
    assert_eq!(s.rejected_samples(), 1);
    assert_eq!(s.diagnostics().rejected(RejectReason::TooFast), 1);
    assert_eq!(s.samples().len(), 1);
}

#[test]
fn test_short_interval_gets_extra_allowance() {
    let (mut s, clock) = session_with(SessionConfig::default());
    s.start();
    s.add_sample(fix_at(0.0, 0));

    // 45 m på 2 s = 81 km/t: over taket, men under 2 × 50
    clock.set(2_000);
    assert!(s.add_sample(fix_at(0.045, 2)).is_accepted());

    // 60 m på 2 s = 108 km/t: avvist
    clock.set(4_000);
    assert_eq!(
        s.add_sample(fix_at(0.105, 4)),
        SampleOutcome::Rejected(RejectReason::TooFast)
    );
}

#[test]
fn test_gate_rejects_bad_fixes() {
    let (mut s, _clock) = session_with(SessionConfig::default());
    s.start();
    assert!(s.add_sample(fix_at(0.0, 10)).is_accepted());

    let out = s.add_sample(Fix::new(91.0, 0.0, 20_000));
    assert_eq!(out, SampleOutcome::Rejected(RejectReason::InvalidCoordinates));

    let out = s.add_sample(fix_at(0.01, 20).with_accuracy(45.0));
    assert_eq!(out, SampleOutcome::Rejected(RejectReason::LowAccuracy));

    let out = s.add_sample(fix_at(0.01, 10));
    assert_eq!(out, SampleOutcome::Rejected(RejectReason::NonMonotonicTimestamp));

    // ukjent nøyaktighet godtas
    let out = s.add_sample(Fix::new(0.0, 0.01 * DEG_PER_KM, 20_000));
    assert!(out.is_accepted());

    assert_eq!(s.rejected_samples(), 3);
    assert_eq!(s.samples().len(), 2);
}

#[test]
fn test_fixes_ignored_unless_running() {
    let (mut s, clock) = session_with(SessionConfig::default());
    assert_eq!(s.add_sample(fix_at(0.0, 0)), SampleOutcome::Ignored(SessionStateKind::Idle));

    s.start();
    s.add_sample(fix_at(0.0, 0));
    s.pause();
    clock.set(5_000);
    assert_eq!(
        s.add_sample(fix_at(0.01, 5)),
        SampleOutcome::Ignored(SessionStateKind::Paused)
    );

    s.stop();
    assert_eq!(
        s.add_sample(fix_at(0.02, 10)),
        SampleOutcome::Ignored(SessionStateKind::Stopped)
    );
    assert_eq!(s.samples().len(), 1);
    assert_eq!(s.diagnostics().ignored_fixes, 3);
    assert_eq!(s.rejected_samples(), 0);
}

#[test]
fn test_pause_excluded_from_duration() {
    let (mut s, clock) = session_with(SessionConfig::default());
    s.start();
    s.add_sample(fix_at(0.0, 0));
    clock.set(30_000);
    s.add_sample(fix_at(0.1, 30));
    clock.set(60_000);
    s.add_sample(fix_at(0.2, 60));

    assert!(s.pause());
    clock.set(90_000);
    assert!(s.resume());

    clock.set(120_000);
    let stats = s.stats();
    assert_eq!(stats.state, SessionStateKind::Running);
    assert_eq!(stats.duration_s, 90.0);
    assert_eq!(s.paused_ms(), 30_000);
}

#[test]
fn test_duration_frozen_while_paused_and_after_stop() {
    let (mut s, clock) = session_with(SessionConfig::default());
    s.start();
    clock.set(40_000);
    s.pause();
    clock.set(100_000);
    assert_eq!(s.stats().duration_s, 40.0);

    s.resume();
    clock.set(120_000);
    let summary = s.stop();
    clock.set(500_000);
    assert_eq!(s.stats().duration_s, 60.0);
    assert_eq!(summary.state, SessionStateKind::Stopped);
    assert_eq!(summary.paused_s, 60.0);
}

#[test]
fn test_movement_during_pause_does_not_count() {
    let (mut s, clock) = session_with(SessionConfig::default());
    s.start();
    s.add_sample(fix_at(0.0, 0));
    clock.set(30_000);
    s.add_sample(fix_at(0.1, 30));

    s.pause();
    clock.set(300_000);
    s.resume();

    // 5 km unna etter pausen: nytt segment, ingen distanse
    let out = s.add_sample(fix_at(5.0, 300));
    assert!(out.is_accepted());
    let after = s.samples().last().copied().expect("sample");
    assert_eq!(after.delta_km, 0.0);
    assert_eq!(after.elapsed_s, 0.0);
    assert!((s.totals().distance_km - 0.1).abs() < 1e-9);

    clock.set(330_000);
    s.add_sample(fix_at(5.1, 330));
    assert!((s.totals().distance_km - 0.2).abs() < 1e-9);
    assert_eq!(s.totals().duration_s, 60.0);
}

#[test]
fn test_lap_count_is_floor_of_distance() {
    let (mut s, clock) = session_with(SessionConfig::default());
    s.start();
    // 25 m hvert 10. s (9 km/t), 3.5 km
    feed_run(&mut s, &clock, 3.5, 0.025, 10);

    assert_eq!(s.laps().len(), 3);
    let samples = s.samples();
    let mut prev_end: Option<usize> = None;
    for lap in s.laps() {
        let threshold = lap.index as f64;
        assert!(samples[lap.end_index].cumulative_km >= threshold);
        if let Some(p) = prev_end {
            assert!(samples[p].cumulative_km < threshold);
            assert_eq!(lap.start_index, p + 1);
        }
        assert!(lap.distance_km >= 0.99 && lap.distance_km < 1.03, "lap {lap:?}");
        prev_end = Some(lap.end_index);
    }

    // kumulativ distanse er monoton
    assert!(samples.windows(2).all(|w| w[1].cumulative_km >= w[0].cumulative_km));
    let last = samples.last().expect("samples");
    assert_eq!(s.totals().distance_km, last.cumulative_km);
}

#[test]
fn test_miles_use_mile_splits() {
    let (mut s, clock) = session_with(SessionConfig::for_unit(DistanceUnit::Mi));
    s.start();
    feed_run(&mut s, &clock, 2.0, 0.025, 10);

    assert_eq!(s.laps().len(), 1);
    assert!(s.laps()[0].distance_km >= 1.609);
    assert_eq!(s.summary().unit, DistanceUnit::Mi);
}

#[test]
fn test_split_override() {
    let config = SessionConfig { split_distance_km: Some(0.4), ..Default::default() };
    let (mut s, clock) = session_with(config);
    s.start();
    feed_run(&mut s, &clock, 1.0, 0.025, 10);
    assert_eq!(s.laps().len(), 2);
}

#[test]
fn test_elevation_totals_with_threshold() {
    let (mut s, clock) = session_with(SessionConfig::default());
    s.start();
    let altitudes = [100.0, 101.0, 102.0, 106.0, 104.0, 100.0];
    for (i, alt) in altitudes.iter().enumerate() {
        let t = i as u64 * 10;
        clock.set(t * 1000);
        s.add_sample(fix_at(i as f64 * 0.025, t).with_altitude(*alt));
    }
    assert_eq!(s.totals().elevation_gain_m, 4.0);
    assert_eq!(s.totals().elevation_loss_m, 4.0);
}

#[test]
fn test_pace_and_calories_follow_samples() {
    let (mut s, clock) = session_with(SessionConfig::default());
    s.start();
    // 25 m / 10 s = 400 s/km
    feed_run(&mut s, &clock, 0.5, 0.025, 10);

    let last = s.samples().last().expect("samples");
    let instant = last.instant_pace_s_per_km.expect("instant pace");
    let smoothed = last.smoothed_pace_s_per_km.expect("smoothed pace");
    assert!((instant - 400.0).abs() < 1e-6);
    assert!((smoothed - 400.0).abs() < 1e-6);

    let stats = s.stats();
    let current = stats.current_pace_s_per_km.expect("current pace");
    assert!((current - 400.0).abs() < 1e-6);
    assert!(stats.rolling_pace_s_per_km.is_some());
    assert!(stats.calories_kcal > 0.0);

    let avg = s.totals().avg_pace_s_per_km.expect("avg pace");
    assert!((avg - 400.0).abs() < 1e-6);
}

#[test]
fn test_no_samples_means_zero_totals() {
    let (mut s, clock) = session_with(SessionConfig::default());
    s.start();
    clock.set(60_000);
    let stats = s.stats();
    assert_eq!(stats.distance_km, 0.0);
    assert_eq!(stats.avg_pace_s_per_km, None);
    assert_eq!(stats.calories_kcal, 0.0);
    assert_eq!(s.totals().distance_km, 0.0);
}

#[test]
fn test_reset_and_replay_is_deterministic() {
    let config = SessionConfig::default();
    let (mut s, clock) = session_with(config);
    s.start();
    feed_run(&mut s, &clock, 2.3, 0.025, 10);
    let first_totals = s.totals().clone();
    let first_laps = s.laps().to_vec();
    let first_id = s.id().to_string();

    s.reset();
    assert_eq!(s.state().kind(), SessionStateKind::Idle);
    assert!(s.samples().is_empty());
    assert_ne!(s.id(), first_id);

    clock.set(0);
    s.start();
    feed_run(&mut s, &clock, 2.3, 0.025, 10);
    assert_eq!(s.totals(), &first_totals);
    assert_eq!(s.laps(), first_laps.as_slice());
}

#[test]
fn test_start_twice_and_stop_from_idle() {
    let (mut s, _clock) = session_with(SessionConfig::default());
    let summary = s.stop();
    assert_eq!(summary.state, SessionStateKind::Idle);
    assert!(summary.started_at.is_none());

    assert!(s.start());
    assert!(!s.start());
    assert!(!s.resume());
}

#[test]
fn test_observer_receives_events() {
    let (mut s, clock) = session_with(SessionConfig { split_distance_km: Some(0.1), ..Default::default() });
    let (tx, rx) = mpsc::channel();
    let id = s.subscribe(Box::new(ChannelObserver::new(tx)));

    s.start();
    feed_run(&mut s, &clock, 0.125, 0.025, 10);
    s.pause();
    s.resume();
    s.add_sample(Fix::new(95.0, 0.0, 1_000_000));

    let events: Vec<SessionEvent> = rx.try_iter().collect();
    let samples = events.iter().filter(|e| matches!(e, SessionEvent::Sample(_))).count();
    let splits = events.iter().filter(|e| matches!(e, SessionEvent::Split(_))).count();
    assert_eq!(samples, 6);
    assert_eq!(splits, 1);
    assert!(events.contains(&SessionEvent::Paused));
    assert!(events.contains(&SessionEvent::Resumed));
    assert!(events.contains(&SessionEvent::SampleRejected(RejectReason::InvalidCoordinates)));

    assert!(s.unsubscribe(id));
    assert!(!s.unsubscribe(id));
}

#[test]
fn test_invalid_config_fails_construction() {
    let bad_split = SessionConfig { split_distance_km: Some(0.0), ..Default::default() };
    assert!(matches!(
        Session::new(bad_split),
        Err(TrackError::InvalidConfiguration(_))
    ));

    let bad_alpha = SessionConfig { pace_alpha: 0.0, ..Default::default() };
    assert!(Session::new(bad_alpha).is_err());
}

#[test]
fn test_rejected_fixes_kept_for_audit() {
    let config = SessionConfig { keep_rejected_fixes: true, ..Default::default() };
    let (mut s, _clock) = session_with(config);
    s.start();
    s.add_sample(fix_at(0.0, 0).with_accuracy(80.0));
    let kept = &s.diagnostics().rejected_fixes;
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].1, RejectReason::LowAccuracy);
}

#[test]
fn test_gps_quality_comes_from_sensor() {
    let (mut s, clock) = session_with(SessionConfig::default());
    assert_eq!(s.stats().gps_quality, SignalQuality::Unavailable);

    s.set_gps_quality(SignalQuality::Good);
    s.add_sample(fix_at(0.0, 0).with_accuracy(3.0));
    assert_eq!(s.stats().gps_quality, SignalQuality::Good);

    s.start();
    s.add_sample(fix_at(0.0, 0));
    clock.set(10_000);
    s.add_sample(fix_at(0.025, 10).with_accuracy(45.0));
    assert_eq!(s.stats().gps_quality, SignalQuality::Good);
}
