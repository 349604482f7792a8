use runtrack_core::calories::{estimate_calories, met_for_speed};
use runtrack_core::models::{Sex, UserProfile};

fn profile(age_years: Option<u32>, sex: Sex) -> UserProfile {
    UserProfile { weight_kg: 70.0, age_years, sex }
}

#[test]
fn test_met_bands() {
    assert_eq!(met_for_speed(5.0), 6.0);
    assert_eq!(met_for_speed(6.4), 6.0);
    assert_eq!(met_for_speed(8.0), 8.3);
    assert_eq!(met_for_speed(10.0), 11.0);
    assert_eq!(met_for_speed(14.5), 12.8);
    assert_eq!(met_for_speed(16.0), 14.5);
}

#[test]
fn test_one_hour_at_10_kmh() {
    // 11.0 MET × 70 kg × 1 t
    let kcal = estimate_calories(10.0, 3600.0, &profile(None, Sex::Male));
    assert!((kcal - 770.0).abs() < 1e-9, "got {kcal}");
}

#[test]
fn test_age_and_sex_adjustments() {
    let older = estimate_calories(10.0, 3600.0, &profile(Some(65), Sex::Male));
    let younger = estimate_calories(10.0, 3600.0, &profile(Some(20), Sex::Male));
    let female = estimate_calories(10.0, 3600.0, &profile(Some(40), Sex::Female));

    assert!((older - 847.0).abs() < 1e-9);
    assert!((younger - 731.5).abs() < 1e-9);
    assert!((female - 693.0).abs() < 1e-9);
}

#[test]
fn test_zero_distance_is_zero_calories() {
    assert_eq!(estimate_calories(0.0, 1800.0, &UserProfile::default()), 0.0);
    assert_eq!(estimate_calories(2.0, 0.0, &UserProfile::default()), 0.0);
}
