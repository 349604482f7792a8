use serde::{Deserialize, Serialize};

use crate::physics::haversine_km;

/// Én rå GPS-observasjon fra sensoren.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub lat: f64,                 // grader [-90, 90]
    pub lon: f64,                 // grader [-180, 180]
    pub timestamp_ms: u64,        // millisekunder (monoton eller wall-clock)
    #[serde(default)]
    pub accuracy_m: Option<f64>,  // horisontal nøyaktighet, meter
    #[serde(default)]
    pub altitude_m: Option<f64>,  // meter over havet
    #[serde(default)]
    pub speed_mps: Option<f64>,   // m/s
}

impl Fix {
    pub fn new(lat: f64, lon: f64, timestamp_ms: u64) -> Self {
        Self {
            lat,
            lon,
            timestamp_ms,
            accuracy_m: None,
            altitude_m: None,
            speed_mps: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    pub fn with_altitude(mut self, altitude_m: f64) -> Self {
        self.altitude_m = Some(altitude_m);
        self
    }

    /// Koordinater innenfor gyldig område (og endelige).
    pub fn has_valid_coordinates(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Storsirkelavstand i meter.
    pub fn distance_m_to(&self, other: &Fix) -> f64 {
        haversine_km(self.lat, self.lon, other.lat, other.lon) * 1000.0
    }
}

/// En akseptert Fix beriket med avledede felt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub index: usize,
    pub fix: Fix,
    pub cumulative_km: f64,
    pub delta_km: f64,        // avstand fra forrige sample (0 ved segmentstart)
    pub elapsed_s: f64,       // aktiv tid siden forrige sample (0 ved segmentstart)
    pub instant_pace_s_per_km: Option<f64>,
    pub smoothed_pace_s_per_km: Option<f64>,
    pub elevation_m: Option<f64>,
}

impl Sample {
    #[inline]
    pub fn timestamp_ms(&self) -> u64 {
        self.fix.timestamp_ms
    }
}

/// Lukket intervall over sample-sekvensen som dekker én splitt-distanse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lap {
    pub index: usize,        // 1-basert
    pub start_index: usize,
    pub end_index: usize,
    pub distance_km: f64,
    pub duration_s: f64,
    pub avg_pace_s_per_km: Option<f64>,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
}

/// Løpende totaler for en økt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub distance_km: f64,
    pub duration_s: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub avg_pace_s_per_km: Option<f64>,
    pub calories_kcal: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    #[default]
    Km,
    Mi,
}

pub const KM_PER_MILE: f64 = 1.609_344;

impl DistanceUnit {
    /// Lengden av én enhet i km (standard splitt-distanse).
    pub fn km(self) -> f64 {
        match self {
            DistanceUnit::Km => 1.0,
            DistanceUnit::Mi => KM_PER_MILE,
        }
    }

    pub fn from_km(self, km: f64) -> f64 {
        km / self.km()
    }

    /// Tempo (s/km) → tempo per valgt enhet (s/km eller s/mi).
    pub fn pace_from_s_per_km(self, pace_s_per_km: f64) -> f64 {
        pace_s_per_km * self.km()
    }

    pub fn label(self) -> &'static str {
        match self {
            DistanceUnit::Km => "km",
            DistanceUnit::Mi => "mi",
        }
    }
}

impl std::str::FromStr for DistanceUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "km" | "kilometer" | "kilometers" => Ok(DistanceUnit::Km),
            "mi" | "mile" | "miles" => Ok(DistanceUnit::Mi),
            other => Err(format!("unknown distance unit '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unspecified,
}

/// Brukerprofil for kaloriestimat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub weight_kg: f64,
    pub age_years: Option<u32>,
    pub sex: Sex,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            weight_kg: 70.0,
            age_years: None,
            sex: Sex::Unspecified,
        }
    }
}

/// Klassifisering av GPS-signal ut fra horisontal nøyaktighet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    #[default]
    Unavailable,
}

impl SignalQuality {
    pub fn from_accuracy(accuracy_m: Option<f64>) -> Self {
        match accuracy_m {
            Some(a) if !a.is_finite() || a < 0.0 => SignalQuality::Unavailable,
            Some(a) if a <= 5.0 => SignalQuality::Excellent,
            Some(a) if a <= 10.0 => SignalQuality::Good,
            Some(a) if a <= 20.0 => SignalQuality::Fair,
            Some(a) if a <= 50.0 => SignalQuality::Poor,
            _ => SignalQuality::Unavailable,
        }
    }
}
