use runtrack_core::models::{Fix, Sample};
use runtrack_core::smoothing::{rolling_pace, PaceSmoother};

fn sample(index: usize, t_s: u64, cumulative_km: f64, elapsed_s: f64) -> Sample {
    Sample {
        index,
        fix: Fix::new(0.0, 0.0, t_s * 1000),
        cumulative_km,
        delta_km: 0.0,
        elapsed_s,
        instant_pace_s_per_km: None,
        smoothed_pace_s_per_km: None,
        elevation_m: None,
    }
}

#[test]
fn test_ema_converges_towards_new_pace() {
    let mut ema = PaceSmoother::new(0.3);
    ema.update(300.0);
    let mut last = 0.0;
    for _ in 0..30 {
        last = ema.update(360.0);
    }
    assert!((last - 360.0).abs() < 0.1, "got {last}");

    ema.reset();
    assert_eq!(ema.value(), None);
}

#[test]
fn test_rolling_pace_uses_window() {
    // 10 m hvert 5. sekund = 500 s/km; de første samples er tregere
    let mut samples = vec![sample(0, 0, 0.0, 0.0), sample(1, 5, 0.002, 5.0)];
    let mut cum = 0.002;
    for i in 2..=10 {
        cum += 0.01;
        samples.push(sample(i, i as u64 * 5, cum, 5.0));
    }

    let p = rolling_pace(&samples, 15.0).expect("pace in window");
    assert!((p - 500.0).abs() < 1e-6, "got {p}");
}

#[test]
fn test_rolling_pace_needs_two_samples() {
    assert_eq!(rolling_pace(&[], 15.0), None);
    assert_eq!(rolling_pace(&[sample(0, 0, 0.0, 0.0)], 15.0), None);
}
