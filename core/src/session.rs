//! Session Engine: livssyklus og avledet løpsstatistikk.
//!
//! Tilstandsmaskin `Idle → Running ⇄ Paused → Stopped`. Fixer tas kun imot i
//! `Running`; ellers er `add_sample` en no-op. Støyende GPS-data gir aldri
//! feil, bare avviste samples (telt i `Diagnostics`).

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info};

use crate::calories::estimate_calories;
use crate::clock::{to_utc, Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::TrackError;
use crate::events::{ObserverId, Observers, SessionEvent, SessionObserver};
use crate::metrics::{samples_accepted_total, samples_rejected_total, Metrics, METRICS};
use crate::models::{DistanceUnit, Fix, Lap, Sample, SignalQuality, Totals, UserProfile};
use crate::physics::{elevation_gain_loss, haversine_km, pace_s_per_km, speed_kmh, MS_PER_S};
use crate::smoothing::{rolling_pace, PaceSmoother};
use crate::types::{
    Diagnostics, LiveStats, RejectReason, SampleOutcome, SessionStateKind, SessionSummary,
};

static SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Tilstand med tidspunktene den trenger (ms på klokkens tidsakse).
/// Ugyldige kombinasjoner (pauset uten start o.l.) kan ikke uttrykkes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running { started_ms: u64 },
    Paused { started_ms: u64, since_ms: u64 },
    Stopped { started_ms: u64, stopped_ms: u64 },
}

impl SessionState {
    pub fn kind(&self) -> SessionStateKind {
        match self {
            SessionState::Idle => SessionStateKind::Idle,
            SessionState::Running { .. } => SessionStateKind::Running,
            SessionState::Paused { .. } => SessionStateKind::Paused,
            SessionState::Stopped { .. } => SessionStateKind::Stopped,
        }
    }

    pub fn started_ms(&self) -> Option<u64> {
        match *self {
            SessionState::Idle => None,
            SessionState::Running { started_ms }
            | SessionState::Paused { started_ms, .. }
            | SessionState::Stopped { started_ms, .. } => Some(started_ms),
        }
    }
}

pub struct Session {
    id: String,
    config: SessionConfig,
    split_km: f64,
    state: SessionState,
    paused_total_ms: u64,
    samples: Vec<Sample>,
    laps: Vec<Lap>,
    totals: Totals,
    smoother: PaceSmoother,
    // neste aksepterte sample starter nytt segment (etter resume)
    segment_break: bool,
    last_elevation: Option<f64>,
    elevation_requested: BTreeSet<usize>,
    diagnostics: Diagnostics,
    gps_quality: SignalQuality,
    clock: Arc<dyn Clock>,
    observers: Observers,
    metrics: &'static Metrics,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("samples", &self.samples.len())
            .field("laps", &self.laps.len())
            .field("totals", &self.totals)
            .finish()
    }
}

impl Session {
    /// Ny økt med systemklokke. Feiler kun på ugyldig konfig.
    pub fn new(config: SessionConfig) -> Result<Self, TrackError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: SessionConfig, clock: Arc<dyn Clock>) -> Result<Self, TrackError> {
        config.validate()?;
        let split_km = config.split_distance_km();
        let smoother = PaceSmoother::new(config.pace_alpha);
        let id = new_session_id(clock.now_ms());
        Ok(Self {
            id,
            config,
            split_km,
            state: SessionState::Idle,
            paused_total_ms: 0,
            samples: Vec::new(),
            laps: Vec::new(),
            totals: Totals::default(),
            smoother,
            segment_break: false,
            last_elevation: None,
            elevation_requested: BTreeSet::new(),
            diagnostics: Diagnostics::default(),
            gps_quality: SignalQuality::Unavailable,
            clock,
            observers: Observers::default(),
            metrics: &*METRICS,
        })
    }

    // ── accessors ───────────────────────────────────────────────────────────

    pub fn id(&self) -> &str { &self.id }
    pub fn config(&self) -> &SessionConfig { &self.config }
    pub fn unit(&self) -> DistanceUnit { self.config.unit }
    pub fn split_distance_km(&self) -> f64 { self.split_km }
    pub fn state(&self) -> SessionState { self.state }
    pub fn samples(&self) -> &[Sample] { &self.samples }
    pub fn laps(&self) -> &[Lap] { &self.laps }
    pub fn totals(&self) -> &Totals { &self.totals }
    pub fn diagnostics(&self) -> &Diagnostics { &self.diagnostics }
    pub fn rejected_samples(&self) -> u64 { self.diagnostics.rejected_samples }
    pub fn gps_quality(&self) -> SignalQuality { self.gps_quality }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, SessionState::Paused { .. })
    }

    /// Samlet pausetid (ms), inkludert pågående pause.
    pub fn paused_ms(&self) -> u64 {
        match self.state {
            SessionState::Paused { since_ms, .. } => {
                self.paused_total_ms + self.clock.now_ms().saturating_sub(since_ms)
            }
            _ => self.paused_total_ms,
        }
    }

    // ── observers ───────────────────────────────────────────────────────────

    pub fn subscribe(&mut self, observer: Box<dyn SessionObserver>) -> ObserverId {
        self.observers.add(observer)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    /// Passthrough av signalkvalitet fra Sensor Adapter.
    pub fn set_gps_quality(&mut self, quality: SignalQuality) {
        self.gps_quality = quality;
    }

    // ── livssyklus ──────────────────────────────────────────────────────────

    /// Idle → Running, eller Paused → Running (resume). Returnerer om
    /// tilstanden endret seg.
    pub fn start(&mut self) -> bool {
        let now = self.clock.now_ms();
        match self.state {
            SessionState::Idle => {
                self.state = SessionState::Running { started_ms: now };
                info!("session {} started", self.id);
                true
            }
            SessionState::Paused { started_ms, since_ms } => {
                self.paused_total_ms += now.saturating_sub(since_ms);
                self.state = SessionState::Running { started_ms };
                self.segment_break = !self.samples.is_empty();
                info!("session {} resumed after {} ms", self.id, now.saturating_sub(since_ms));
                self.observers.emit(&SessionEvent::Resumed);
                true
            }
            SessionState::Running { .. } | SessionState::Stopped { .. } => false,
        }
    }

    pub fn resume(&mut self) -> bool {
        self.is_paused() && self.start()
    }

    pub fn pause(&mut self) -> bool {
        match self.state {
            SessionState::Running { started_ms } => {
                let since_ms = self.clock.now_ms();
                self.state = SessionState::Paused { started_ms, since_ms };
                info!("session {} paused", self.id);
                self.observers.emit(&SessionEvent::Paused);
                true
            }
            _ => false,
        }
    }

    /// Fryser økten og returnerer sluttrapport. Fra Idle/Stopped: kun rapport.
    pub fn stop(&mut self) -> SessionSummary {
        let now = self.clock.now_ms();
        let stopped = match self.state {
            SessionState::Running { started_ms } => Some(started_ms),
            SessionState::Paused { started_ms, since_ms } => {
                self.paused_total_ms += now.saturating_sub(since_ms);
                Some(started_ms)
            }
            SessionState::Idle | SessionState::Stopped { .. } => None,
        };

        if let Some(started_ms) = stopped {
            self.state = SessionState::Stopped { started_ms, stopped_ms: now };
            info!(
                "session {} stopped: {:.3} km, {} laps, {} rejected",
                self.id,
                self.totals.distance_km,
                self.laps.len(),
                self.diagnostics.rejected_samples
            );
            let totals = self.totals.clone();
            self.observers.emit(&SessionEvent::Stats(totals));
        }
        self.summary()
    }

    /// Nullstiller alt unntatt konfig og observatører; ny id.
    pub fn reset(&mut self) {
        self.id = new_session_id(self.clock.now_ms());
        self.state = SessionState::Idle;
        self.paused_total_ms = 0;
        self.samples.clear();
        self.laps.clear();
        self.totals = Totals::default();
        self.smoother.reset();
        self.segment_break = false;
        self.last_elevation = None;
        self.elevation_requested.clear();
        self.diagnostics = Diagnostics::default();
        debug!("session reset, new id {}", self.id);
    }

    // ── kjernealgoritme ─────────────────────────────────────────────────────

    pub fn add_sample(&mut self, fix: Fix) -> SampleOutcome {
        // 1) kun Running
        if !matches!(self.state, SessionState::Running { .. }) {
            self.diagnostics.ignored_fixes += 1;
            return SampleOutcome::Ignored(self.state.kind());
        }

        // 2–4) avstand, tempo og gyldighetsport
        let (delta_km, elapsed_s) = match self.check_fix(&fix) {
            Ok(v) => v,
            Err(reason) => return self.reject(fix, reason),
        };
        let cumulative_km = self.totals.distance_km + delta_km;
        let instant = pace_s_per_km(elapsed_s, delta_km);

        // 5–6) append + EMA
        let smoothed = match instant {
            Some(p) => Some(self.smoother.update(p)),
            None => self.smoother.value(),
        };
        let index = self.samples.len();
        let sample = Sample {
            index,
            fix,
            cumulative_km,
            delta_km,
            elapsed_s,
            instant_pace_s_per_km: instant,
            smoothed_pace_s_per_km: smoothed,
            elevation_m: fix.altitude_m.filter(|a| a.is_finite()),
        };
        self.samples.push(sample);
        self.segment_break = false;
        samples_accepted_total(self.metrics).inc();

        // 8) totaler (høyde inkrementelt)
        self.update_totals(&sample);
        self.observers.emit(&SessionEvent::Sample(sample));

        // 7) splitter
        for lap in self.detect_splits() {
            debug!(
                "lap {} closed: {:.3} km in {:.1} s",
                lap.index, lap.distance_km, lap.duration_s
            );
            self.observers.emit(&SessionEvent::Split(lap));
        }

        let totals = self.totals.clone();
        self.observers.emit(&SessionEvent::Stats(totals));
        SampleOutcome::Accepted { index }
    }

    /// Gyldighetsport. Ok((delta_km, aktiv tid s)) eller avvisningsgrunn.
    fn check_fix(&self, fix: &Fix) -> Result<(f64, f64), RejectReason> {
        if !fix.has_valid_coordinates() {
            return Err(RejectReason::InvalidCoordinates);
        }
        if let Some(acc) = fix.accuracy_m {
            if !acc.is_finite() || acc > self.config.max_accuracy_m {
                return Err(RejectReason::LowAccuracy);
            }
        }

        let prev = match self.samples.last() {
            Some(p) => p,
            None => return Ok((0.0, 0.0)),
        };
        if fix.timestamp_ms <= prev.timestamp_ms() {
            return Err(RejectReason::NonMonotonicTimestamp);
        }
        if self.segment_break {
            // første fix etter pause: nytt segment, ingen distanse fra før pausen
            return Ok((0.0, 0.0));
        }

        let elapsed_s = (fix.timestamp_ms - prev.timestamp_ms()) as f64 / MS_PER_S;
        let delta_km = haversine_km(prev.fix.lat, prev.fix.lon, fix.lat, fix.lon);

        let mut ceiling = self.config.max_speed_kmh;
        if elapsed_s < self.config.short_interval_s {
            ceiling *= self.config.short_interval_speed_factor;
        }
        if speed_kmh(delta_km, elapsed_s) > ceiling {
            return Err(RejectReason::TooFast);
        }

        Ok((delta_km, elapsed_s))
    }

    fn reject(&mut self, fix: Fix, reason: RejectReason) -> SampleOutcome {
        debug!(
            "rejected fix ({:.6}, {:.6}) @{}: {}",
            fix.lat,
            fix.lon,
            fix.timestamp_ms,
            reason.as_str()
        );
        self.diagnostics.rejected_samples += 1;
        *self.diagnostics.rejected_by_reason.entry(reason).or_insert(0) += 1;
        if self.config.keep_rejected_fixes {
            self.diagnostics.rejected_fixes.push((fix, reason));
        }
        samples_rejected_total(self.metrics, reason).inc();
        self.observers.emit(&SessionEvent::SampleRejected(reason));
        SampleOutcome::Rejected(reason)
    }

    fn update_totals(&mut self, sample: &Sample) {
        let t = &mut self.totals;
        t.distance_km = sample.cumulative_km;
        t.duration_s += sample.elapsed_s;

        if let Some(e) = sample.elevation_m {
            if let Some(prev) = self.last_elevation {
                let (g, l) = elevation_gain_loss([Some(prev), Some(e)], self.config.elevation_threshold_m);
                t.elevation_gain_m += g;
                t.elevation_loss_m += l;
            }
            self.last_elevation = Some(e);
        }

        t.avg_pace_s_per_km = pace_s_per_km(t.duration_s, t.distance_km);
        t.calories_kcal = estimate_calories(t.distance_km, t.duration_s, &self.config.profile);
    }

    /// Lager én runde per manglende splitt-terskel.
    fn detect_splits(&mut self) -> Vec<Lap> {
        let Some(last) = self.samples.last() else { return Vec::new() };
        let last_index = last.index;
        let expected = (last.cumulative_km / self.split_km).floor() as usize;

        let mut created = Vec::new();
        while self.laps.len() < expected {
            let lap_no = self.laps.len() + 1;
            let threshold = lap_no as f64 * self.split_km;
            let (boundary, first) = match self.laps.last() {
                Some(prev) => (prev.end_index, prev.end_index + 1),
                None => (0, 0),
            };
            let end = self.samples[first.min(last_index)..]
                .iter()
                .find(|s| s.cumulative_km >= threshold)
                .map(|s| s.index)
                .unwrap_or(last_index);

            let lap = self.build_lap(lap_no, boundary, first.min(end), end);
            self.laps.push(lap.clone());
            created.push(lap);
        }
        created
    }

    /// Rundestatistikk måles fra forrige rundes sluttsample (eller sample 0)
    /// til `end`, slik at overgangen mellom rundene teller med.
    fn build_lap(&self, lap_no: usize, boundary: usize, start: usize, end: usize) -> Lap {
        let span = &self.samples[boundary..=end];
        let distance_km = self.samples[end].cumulative_km - self.samples[boundary].cumulative_km;
        let duration_s: f64 = span.iter().skip(1).map(|s| s.elapsed_s).sum();
        let (gain, loss) = elevation_gain_loss(
            span.iter().map(|s| s.elevation_m),
            self.config.elevation_threshold_m,
        );

        Lap {
            index: lap_no,
            start_index: start,
            end_index: end,
            distance_km,
            duration_s,
            avg_pace_s_per_km: pace_s_per_km(duration_s, distance_km),
            elevation_gain_m: gain,
            elevation_loss_m: loss,
        }
    }

    // ── høyde-raffinering ───────────────────────────────────────────────────

    /// Samples uten høyde som ikke er forespurt ennå: (indeks, lat, lon).
    /// Markeres som forespurt.
    pub fn pending_elevation_lookups(&mut self) -> Vec<(usize, f64, f64)> {
        let mut out = Vec::new();
        for s in &self.samples {
            if s.elevation_m.is_none() && self.elevation_requested.insert(s.index) {
                out.push((s.index, s.fix.lat, s.fix.lon));
            }
        }
        out
    }

    /// Antall samples som mangler høyde og ikke er forespurt.
    pub fn pending_elevation_count(&self) -> usize {
        self.samples
            .iter()
            .filter(|s| s.elevation_m.is_none() && !self.elevation_requested.contains(&s.index))
            .count()
    }

    /// Fyller inn høyde for samples som mangler den og beregner stigning/fall
    /// på nytt. Distanse og runder endres aldri. Returnerer antall oppdaterte.
    pub fn apply_elevations(&mut self, updates: &[(usize, Option<f64>)]) -> usize {
        let mut applied = 0;
        for &(index, elevation) in updates {
            let Some(e) = elevation.filter(|e| e.is_finite()) else { continue };
            if let Some(s) = self.samples.get_mut(index) {
                if s.elevation_m.is_none() {
                    s.elevation_m = Some(e);
                    applied += 1;
                }
            }
        }
        if applied > 0 {
            let (gain, loss) = elevation_gain_loss(
                self.samples.iter().map(|s| s.elevation_m),
                self.config.elevation_threshold_m,
            );
            self.totals.elevation_gain_m = gain;
            self.totals.elevation_loss_m = loss;
            self.last_elevation = self.samples.iter().rev().find_map(|s| s.elevation_m);
            let totals = self.totals.clone();
            self.observers.emit(&SessionEvent::Stats(totals));
        }
        applied
    }

    pub fn apply_elevation(&mut self, index: usize, elevation_m: f64) -> bool {
        self.apply_elevations(&[(index, Some(elevation_m))]) == 1
    }

    // ── statistikk ──────────────────────────────────────────────────────────

    /// Wall-clock varighet (s) uten pauser; frosset ved stopp.
    pub fn elapsed_s(&self) -> f64 {
        let ms = match self.state {
            SessionState::Idle => 0,
            SessionState::Running { started_ms } => self
                .clock
                .now_ms()
                .saturating_sub(started_ms)
                .saturating_sub(self.paused_total_ms),
            SessionState::Paused { started_ms, since_ms } => since_ms
                .saturating_sub(started_ms)
                .saturating_sub(self.paused_total_ms),
            SessionState::Stopped { started_ms, stopped_ms } => stopped_ms
                .saturating_sub(started_ms)
                .saturating_sub(self.paused_total_ms),
        };
        ms as f64 / MS_PER_S
    }

    pub fn get_stats(&self, profile: &UserProfile) -> LiveStats {
        let distance_km = self.totals.distance_km;
        let duration_s = self.elapsed_s();
        let avg = pace_s_per_km(duration_s, distance_km);
        let current = self
            .samples
            .last()
            .and_then(|s| s.smoothed_pace_s_per_km)
            .or(avg);

        LiveStats {
            state: self.state.kind(),
            distance_km,
            duration_s,
            avg_pace_s_per_km: avg,
            current_pace_s_per_km: current,
            rolling_pace_s_per_km: rolling_pace(&self.samples, self.config.pace_window_s),
            elevation_gain_m: self.totals.elevation_gain_m,
            elevation_loss_m: self.totals.elevation_loss_m,
            calories_kcal: estimate_calories(distance_km, duration_s, profile),
            laps: self.laps.len(),
            gps_quality: self.gps_quality,
        }
    }

    /// `get_stats` med profilen fra konfig.
    pub fn stats(&self) -> LiveStats {
        self.get_stats(&self.config.profile)
    }

    pub fn summary(&self) -> SessionSummary {
        let stopped_at = match self.state {
            SessionState::Stopped { stopped_ms, .. } => to_utc(stopped_ms),
            _ => None,
        };
        SessionSummary {
            session_id: self.id.clone(),
            state: self.state.kind(),
            unit: self.config.unit,
            split_distance_km: self.split_km,
            started_at: self.state.started_ms().and_then(to_utc),
            stopped_at,
            paused_s: self.paused_ms() as f64 / MS_PER_S,
            samples: self.samples.len(),
            totals: self.totals.clone(),
            laps: self.laps.clone(),
            rejected_samples: self.diagnostics.rejected_samples,
        }
    }
}

fn new_session_id(now_ms: u64) -> String {
    let seq = SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("run-{now_ms}-{seq:04}")
}
