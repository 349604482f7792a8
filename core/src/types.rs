use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{DistanceUnit, Fix, Lap, SignalQuality, Totals};

/// Hvorfor en fix ble avvist av motoren. Kun diagnostikk, aldri en feil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    InvalidCoordinates,
    LowAccuracy,
    TooFast,
    NonMonotonicTimestamp,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::InvalidCoordinates => "invalid_coordinates",
            RejectReason::LowAccuracy => "low_accuracy",
            RejectReason::TooFast => "too_fast",
            RejectReason::NonMonotonicTimestamp => "non_monotonic_timestamp",
        }
    }
}

/// Livssyklus uten data – til rapporter og snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStateKind {
    Idle,
    Running,
    Paused,
    Stopped,
}

/// Resultat av `Session::add_sample`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Accepted { index: usize },
    Rejected(RejectReason),
    /// Økten tar ikke imot fixer i denne tilstanden (no-op).
    Ignored(SessionStateKind),
}

impl SampleOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SampleOutcome::Accepted { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub rejected_samples: u64,
    pub rejected_by_reason: BTreeMap<RejectReason, u64>,
    /// Fixer mottatt mens økten ikke kjørte.
    pub ignored_fixes: u64,
    /// Kun fylt når `keep_rejected_fixes` er på.
    pub rejected_fixes: Vec<(Fix, RejectReason)>,
}

impl Diagnostics {
    pub fn rejected(&self, reason: RejectReason) -> u64 {
        self.rejected_by_reason.get(&reason).copied().unwrap_or(0)
    }
}

/// Live-statistikk (get_stats).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStats {
    pub state: SessionStateKind,
    pub distance_km: f64,
    /// Wall-clock varighet uten pauser.
    pub duration_s: f64,
    pub avg_pace_s_per_km: Option<f64>,
    pub current_pace_s_per_km: Option<f64>,
    pub rolling_pace_s_per_km: Option<f64>,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub calories_kcal: f64,
    pub laps: usize,
    pub gps_quality: SignalQuality,
}

/// Sluttrapport fra `Session::stop` (eller øyeblikksbilde).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub state: SessionStateKind,
    pub unit: DistanceUnit,
    pub split_distance_km: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub paused_s: f64,
    pub samples: usize,
    pub totals: Totals,
    pub laps: Vec<Lap>,
    pub rejected_samples: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorStatus {
    pub available: bool,
    pub has_permission: bool,
    pub is_tracking: bool,
    pub last_update: Option<DateTime<Utc>>,
    pub signal_quality: SignalQuality,
}
