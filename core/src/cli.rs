//! Replay av et innspilt fix-spor gjennom en økt, med rapport.
//!
//! Input er enten en ren liste med fixer, eller et objekt
//! `{ "config": {...}, "fixes": [...] }`. Feltnavn er tolerante
//! (`lat`/`latitude`, `lon`/`lng`/`longitude`, osv).

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

use crate::clock::ManualClock;
use crate::config::SessionConfig;
use crate::error::ReplayError;
use crate::models::Fix;
use crate::physics::RoundTo;
use crate::session::Session;
use crate::types::SessionSummary;

// Tolerant fix-inngang (for eldre/avvikende feltnavn)
#[derive(Debug, Deserialize, Clone)]
struct FixInTol {
    #[serde(alias = "latitude")]
    lat: f64,
    #[serde(alias = "lng", alias = "longitude")]
    lon: f64,
    #[serde(alias = "timestamp", alias = "t_ms", alias = "time_ms")]
    timestamp_ms: u64,
    #[serde(default, alias = "accuracy", alias = "horizontal_accuracy")]
    accuracy_m: Option<f64>,
    #[serde(default, alias = "altitude", alias = "alt", alias = "elev")]
    altitude_m: Option<f64>,
    #[serde(default, alias = "speed")]
    speed_mps: Option<f64>,
}

impl From<FixInTol> for Fix {
    fn from(f: FixInTol) -> Self {
        Fix {
            lat: f.lat,
            lon: f.lon,
            timestamp_ms: f.timestamp_ms,
            accuracy_m: f.accuracy_m,
            altitude_m: f.altitude_m,
            speed_mps: f.speed_mps,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReplayObject {
    #[serde(default)]
    config: SessionConfig,
    fixes: Vec<FixInTol>,
}

#[derive(Debug, Clone)]
pub struct ReplayInput {
    pub config: SessionConfig,
    pub fixes: Vec<Fix>,
}

fn from_value<T: serde::de::DeserializeOwned>(v: Value) -> Result<T, ReplayError> {
    serde_path_to_error::deserialize(v).map_err(|e| ReplayError::Parse {
        at: e.path().to_string(),
        message: e.inner().to_string(),
    })
}

/// Parser et spor. Prøver objekt først, deretter ren liste.
pub fn parse_track_json(json: &str) -> Result<ReplayInput, ReplayError> {
    let v: Value = serde_json::from_str(json).map_err(|e| ReplayError::Parse {
        at: format!("line {} column {}", e.line(), e.column()),
        message: e.to_string(),
    })?;

    let (config, fixes) = if v.is_array() {
        let fixes: Vec<FixInTol> = from_value(v)?;
        (SessionConfig::default(), fixes)
    } else {
        let obj: ReplayObject = from_value(v)?;
        (obj.config, obj.fixes)
    };
    config.validate()?;

    Ok(ReplayInput {
        config,
        fixes: fixes.into_iter().map(Fix::from).collect(),
    })
}

/// Spiller fixene gjennom en ny økt med manuell klokke som følger
/// fix-tidene. Deterministisk for samme input.
pub fn replay(fixes: &[Fix], config: SessionConfig) -> Result<SessionSummary, ReplayError> {
    let start_ms = fixes.first().map(|f| f.timestamp_ms).unwrap_or(0);
    let clock = ManualClock::new(start_ms);
    let mut session = Session::with_clock(config, Arc::new(clock.clone()))?;

    session.start();
    for fix in fixes {
        clock.set(fix.timestamp_ms.max(start_ms));
        session.add_sample(*fix);
    }
    Ok(session.stop())
}

/// Tekstrapport (én linje per runde).
pub fn render_report(summary: &SessionSummary) -> String {
    let unit = summary.unit;
    let t = &summary.totals;
    let mut out = String::new();

    let _ = writeln!(out, "--- Session {} ---", summary.session_id);
    let _ = writeln!(
        out,
        "Distance: {:.2} {}",
        unit.from_km(t.distance_km),
        unit.label()
    );
    let _ = writeln!(out, "Duration: {}", format_duration(t.duration_s));
    let _ = writeln!(
        out,
        "Avg pace: {}/{}",
        t.avg_pace_s_per_km.map(|p| format_duration(unit.pace_from_s_per_km(p))).unwrap_or_else(|| "--".into()),
        unit.label()
    );
    let _ = writeln!(
        out,
        "Elevation: +{:.0} m / -{:.0} m",
        t.elevation_gain_m, t.elevation_loss_m
    );
    let _ = writeln!(out, "Calories: {:.0} kcal", t.calories_kcal.round_to(0));
    for lap in &summary.laps {
        let _ = writeln!(
            out,
            "Lap {:>2}: {:.2} {} in {} ({}/{})",
            lap.index,
            unit.from_km(lap.distance_km),
            unit.label(),
            format_duration(lap.duration_s),
            lap.avg_pace_s_per_km
                .map(|p| format_duration(unit.pace_from_s_per_km(p)))
                .unwrap_or_else(|| "--".into()),
            unit.label()
        );
    }
    if summary.rejected_samples > 0 {
        let _ = writeln!(out, "Rejected fixes: {}", summary.rejected_samples);
    }
    out
}

/// Sekunder → "m:ss" eller "h:mm:ss".
pub fn format_duration(secs: f64) -> String {
    let total = if secs.is_finite() { secs.max(0.0).round() as u64 } else { 0 };
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// Leser et spor fra disk og returnerer sluttrapporten som JSON.
pub fn run_replay(path: &str) -> anyhow::Result<String> {
    let json = std::fs::read_to_string(path).with_context(|| format!("reading track {path}"))?;
    let input = parse_track_json(&json).with_context(|| format!("parsing track {path}"))?;
    let summary = replay(&input.fixes, input.config)?;
    log::info!("replayed {} fixes from {path}", input.fixes.len());
    Ok(serde_json::to_string_pretty(&summary)?)
}
