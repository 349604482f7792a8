//! Kaloriestimat fra MET-tabell (Metabolic Equivalent of Task).
//!
//! NB: dette er et grovt estimat, ikke en fysiologisk garanti. Justeringene
//! for alder og kjønn er korreksjonsfaktorer, ikke målte verdier.

use crate::models::{Sex, UserProfile};
use crate::physics::S_PER_HOUR;

/// (øvre fartsgrense km/t, MET) – løping, stigende fart.
pub const MET_BANDS: [(f64, f64); 6] = [
    (6.4, 6.0),
    (8.0, 8.3),
    (9.7, 9.8),
    (11.3, 11.0),
    (12.9, 11.8),
    (14.5, 12.8),
];

/// MET for fart over høyeste bånd.
pub const MET_FALLBACK: f64 = 14.5;

/// MET-verdi for gitt snittfart (km/t).
pub fn met_for_speed(speed_kmh: f64) -> f64 {
    MET_BANDS
        .iter()
        .find(|(upper, _)| speed_kmh <= *upper)
        .map(|(_, met)| *met)
        .unwrap_or(MET_FALLBACK)
}

/// Faktor for alder: +10 % over 60 år, −5 % under 25 år.
pub fn age_factor(age_years: Option<u32>) -> f64 {
    match age_years {
        Some(a) if a > 60 => 1.10,
        Some(a) if a < 25 => 0.95,
        _ => 1.0,
    }
}

/// Faktor for kjønn: −10 % for kvinner.
pub fn sex_factor(sex: Sex) -> f64 {
    match sex {
        Sex::Female => 0.90,
        _ => 1.0,
    }
}

/// kcal = MET × kg × timer, justert for alder og kjønn.
/// Null distanse eller varighet gir 0 kcal.
pub fn estimate_calories(distance_km: f64, duration_s: f64, profile: &UserProfile) -> f64 {
    if distance_km <= 0.0 || duration_s <= 0.0 {
        return 0.0;
    }
    let hours = duration_s / S_PER_HOUR;
    let speed = distance_km / hours;
    let weight = if profile.weight_kg.is_finite() { profile.weight_kg.max(0.0) } else { 0.0 };

    let kcal = met_for_speed(speed) * weight * hours * age_factor(profile.age_years) * sex_factor(profile.sex);
    if kcal.is_finite() { kcal.max(0.0) } else { 0.0 }
}
