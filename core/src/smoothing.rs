use crate::models::Sample;
use crate::physics::{pace_s_per_km, MS_PER_S};

/// Eksponentielt glidende snitt (EMA) for tempo.
/// Seedes av første momentane tempo; `None` frem til da.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaceSmoother {
    alpha: f64,
    value: Option<f64>,
}

impl PaceSmoother {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, value: None }
    }

    /// smoothed = α · instant + (1 − α) · forrige
    pub fn update(&mut self, instant_s_per_km: f64) -> f64 {
        let next = match self.value {
            Some(prev) => self.alpha * instant_s_per_km + (1.0 - self.alpha) * prev,
            None => instant_s_per_km,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

/// Kortsiktig snittempo over de siste `window_s` sekundene av samples.
///
/// Referansen er første sample innenfor vinduet; tid summeres fra
/// `elapsed_s` slik at pauser (segmentstart) ikke teller med.
pub fn rolling_pace(samples: &[Sample], window_s: f64) -> Option<f64> {
    let last = samples.last()?;
    let window_ms = (window_s.max(0.0) * MS_PER_S) as u64;
    let from_ms = last.timestamp_ms().saturating_sub(window_ms);

    let in_window: Vec<&Sample> = samples
        .iter()
        .rev()
        .take_while(|s| s.timestamp_ms() >= from_ms)
        .collect();

    // in_window er nyeste først; siste element er referansen
    let first = *in_window.last()?;
    if first.index == last.index {
        return None;
    }

    let elapsed: f64 = in_window[..in_window.len() - 1].iter().map(|s| s.elapsed_s).sum();
    pace_s_per_km(elapsed, last.cumulative_km - first.cumulative_km)
}
