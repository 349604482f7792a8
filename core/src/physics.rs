// core/src/physics.rs
// Geometri og tempo-matte for løpeøkter.

pub const EARTH_RADIUS_KM: f64 = 6371.0; // sfærisk jord
pub const MS_PER_S: f64 = 1000.0;
pub const S_PER_HOUR: f64 = 3600.0;

// --- RoundTo trait (offentlig, brukt av rapporter og tester) ---
pub trait RoundTo {
    fn round_to(self, dp: u32) -> f64;
}

impl RoundTo for f64 {
    #[inline]
    fn round_to(self, dp: u32) -> f64 {
        if dp == 0 { return self.round(); }
        let factor = 10_f64.powi(dp as i32);
        (self * factor).round() / factor
    }
}

/// Haversine-avstand (km) mellom to punkter.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    let d = EARTH_RADIUS_KM * c;
    if d.is_finite() { d.max(0.0) } else { 0.0 }
}

/// Initiell kurs (grader, 0 = nord, 90 = øst) fra punkt 1 til punkt 2.
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dlon = (lon2 - lon1).to_radians();
    let y = dlon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlon.cos();
    let deg = y.atan2(x).to_degrees();
    (deg + 360.0) % 360.0
}

/// Tempo (s/km) = sek / km. None hvis tid eller distanse ikke er > 0.
#[inline]
pub fn pace_s_per_km(elapsed_s: f64, distance_km: f64) -> Option<f64> {
    if elapsed_s > 0.0 && distance_km > 0.0 {
        let p = elapsed_s / distance_km;
        if p.is_finite() { Some(p) } else { None }
    } else {
        None
    }
}

/// Fart (km/t) = km / timer.
#[inline]
pub fn speed_kmh(distance_km: f64, elapsed_s: f64) -> f64 {
    if elapsed_s <= 0.0 {
        return if distance_km > 0.0 { f64::INFINITY } else { 0.0 };
    }
    distance_km / (elapsed_s / S_PER_HOUR)
}

/// Tempo (s/km) → fart (km/t).
#[inline]
pub fn pace_to_speed_kmh(pace_s_per_km: f64) -> f64 {
    if pace_s_per_km > 0.0 { S_PER_HOUR / pace_s_per_km } else { 0.0 }
}

/// Høydestigning/-fall med støyterskel.
///
/// Kun deltaer mellom påfølgende tilgjengelige høydeverdier teller, og bare
/// når |delta| >= terskel. Deltaer under terskel ignoreres helt.
pub fn elevation_gain_loss<I>(elevations: I, threshold_m: f64) -> (f64, f64)
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut gain = 0.0;
    let mut loss = 0.0;
    let mut prev: Option<f64> = None;

    for e in elevations.into_iter().flatten() {
        if !e.is_finite() { continue; }
        if let Some(p) = prev {
            let d = e - p;
            if d >= threshold_m && d > 0.0 {
                gain += d;
            } else if -d >= threshold_m && d < 0.0 {
                loss += -d;
            }
        }
        prev = Some(e);
    }

    (gain, loss)
}
