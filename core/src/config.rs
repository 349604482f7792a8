//! Konfigurasjon med navngitte standardverdier.
//!
//! Alle terskler som motoren bruker ligger her; kallende kode skal ikke
//! hardkode dem. Verdiene er empirisk tunet, ikke fysiologiske sannheter.

use serde::{Deserialize, Serialize};

use crate::error::TrackError;
use crate::models::{DistanceUnit, UserProfile};

// ── Session Engine ──────────────────────────────────────────────────────────

/// Realistisk fartstak for løping (km/t).
pub const DEFAULT_MAX_SPEED_KMH: f64 = 50.0;
/// Intervaller kortere enn dette (sek) får ekstra slingringsmonn (GPS snap-back).
pub const DEFAULT_SHORT_INTERVAL_S: f64 = 3.0;
/// Multiplikator på fartstaket for korte intervaller.
pub const DEFAULT_SHORT_INTERVAL_SPEED_FACTOR: f64 = 2.0;
/// Fixer med dårligere nøyaktighet (meter) avvises av motoren.
pub const DEFAULT_MAX_ACCURACY_M: f64 = 30.0;
/// EMA-vekt for tempo.
pub const DEFAULT_PACE_ALPHA: f64 = 0.3;
/// Vindu for kortsiktig "nå-tempo" (sek).
pub const DEFAULT_PACE_WINDOW_S: f64 = 15.0;
/// Minste høydeendring (meter) som teller som stigning/fall.
pub const DEFAULT_ELEVATION_THRESHOLD_M: f64 = 3.0;

// ── Sensor Adapter ──────────────────────────────────────────────────────────

pub const DEFAULT_FIX_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_MAX_FIX_AGE_MS: u64 = 5_000;
pub const DEFAULT_MIN_MOVEMENT_M: f64 = 5.0;
pub const DEFAULT_MAX_ACCEPTABLE_ACCURACY_M: f64 = 20.0;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Enhet er låst når økten opprettes.
    pub unit: DistanceUnit,
    /// Overstyr splitt-distanse (km). Standard: én `unit`.
    pub split_distance_km: Option<f64>,
    pub max_speed_kmh: f64,
    pub short_interval_s: f64,
    pub short_interval_speed_factor: f64,
    pub max_accuracy_m: f64,
    pub pace_alpha: f64,
    pub pace_window_s: f64,
    pub elevation_threshold_m: f64,
    /// Behold avviste fixer for revisjon (teller aldri mot distanse).
    pub keep_rejected_fixes: bool,
    pub profile: UserProfile,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            unit: DistanceUnit::Km,
            split_distance_km: None,
            max_speed_kmh: DEFAULT_MAX_SPEED_KMH,
            short_interval_s: DEFAULT_SHORT_INTERVAL_S,
            short_interval_speed_factor: DEFAULT_SHORT_INTERVAL_SPEED_FACTOR,
            max_accuracy_m: DEFAULT_MAX_ACCURACY_M,
            pace_alpha: DEFAULT_PACE_ALPHA,
            pace_window_s: DEFAULT_PACE_WINDOW_S,
            elevation_threshold_m: DEFAULT_ELEVATION_THRESHOLD_M,
            keep_rejected_fixes: false,
            profile: UserProfile::default(),
        }
    }
}

impl SessionConfig {
    pub fn for_unit(unit: DistanceUnit) -> Self {
        Self { unit, ..Default::default() }
    }

    pub fn split_distance_km(&self) -> f64 {
        self.split_distance_km.unwrap_or_else(|| self.unit.km())
    }

    pub fn validate(&self) -> Result<(), TrackError> {
        let split = self.split_distance_km();
        if !(split.is_finite() && split > 0.0) {
            return invalid(format!("split distance must be positive, got {split}"));
        }
        if !(self.max_speed_kmh.is_finite() && self.max_speed_kmh > 0.0) {
            return invalid(format!("max_speed_kmh must be positive, got {}", self.max_speed_kmh));
        }
        if !(self.short_interval_s.is_finite() && self.short_interval_s >= 0.0) {
            return invalid(format!("short_interval_s must be >= 0, got {}", self.short_interval_s));
        }
        if !(self.short_interval_speed_factor.is_finite() && self.short_interval_speed_factor >= 1.0) {
            return invalid(format!(
                "short_interval_speed_factor must be >= 1, got {}",
                self.short_interval_speed_factor
            ));
        }
        if !(self.max_accuracy_m.is_finite() && self.max_accuracy_m > 0.0) {
            return invalid(format!("max_accuracy_m must be positive, got {}", self.max_accuracy_m));
        }
        if !(self.pace_alpha > 0.0 && self.pace_alpha <= 1.0) {
            return invalid(format!("pace_alpha must be in (0, 1], got {}", self.pace_alpha));
        }
        if !(self.pace_window_s.is_finite() && self.pace_window_s > 0.0) {
            return invalid(format!("pace_window_s must be positive, got {}", self.pace_window_s));
        }
        if !(self.elevation_threshold_m.is_finite() && self.elevation_threshold_m >= 0.0) {
            return invalid(format!(
                "elevation_threshold_m must be >= 0, got {}",
                self.elevation_threshold_m
            ));
        }
        if !(self.profile.weight_kg.is_finite() && self.profile.weight_kg > 0.0) {
            return invalid(format!("profile weight must be positive, got {}", self.profile.weight_kg));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorOptions {
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    pub max_fix_age_ms: u64,
    pub min_movement_m: f64,
    pub max_acceptable_accuracy_m: f64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for SensorOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: DEFAULT_FIX_TIMEOUT_MS,
            max_fix_age_ms: DEFAULT_MAX_FIX_AGE_MS,
            min_movement_m: DEFAULT_MIN_MOVEMENT_M,
            max_acceptable_accuracy_m: DEFAULT_MAX_ACCEPTABLE_ACCURACY_M,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl SensorOptions {
    pub fn validate(&self) -> Result<(), TrackError> {
        if !(self.min_movement_m.is_finite() && self.min_movement_m >= 0.0) {
            return invalid(format!("min_movement_m must be >= 0, got {}", self.min_movement_m));
        }
        if !(self.max_acceptable_accuracy_m.is_finite() && self.max_acceptable_accuracy_m > 0.0) {
            return invalid(format!(
                "max_acceptable_accuracy_m must be positive, got {}",
                self.max_acceptable_accuracy_m
            ));
        }
        if self.retry_attempts == 0 {
            return invalid("retry_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Samlet konfig slik den lagres på disk (`storage::load_config`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub session: SessionConfig,
    pub sensor: SensorOptions,
    /// Kapasitet på kommandokøen inn til tracker-tråden.
    pub queue_capacity: usize,
    /// Antall samples uten høyde før et oppslag sendes (0 = av).
    pub elevation_batch: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            sensor: SensorOptions::default(),
            queue_capacity: 64,
            elevation_batch: 20,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), TrackError> {
        self.session.validate()?;
        self.sensor.validate()?;
        if self.queue_capacity == 0 {
            return invalid("queue_capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

fn invalid(msg: String) -> Result<(), TrackError> {
    Err(TrackError::InvalidConfiguration(msg))
}
