//! Prometheus-tellere for sensor, motor og høydeoppslag.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::types::RejectReason;

pub struct Metrics {
    registry: Registry,
    samples_accepted: IntCounter,
    samples_rejected: IntCounterVec,
    fixes_filtered: IntCounterVec,
    elevation_cache_hit: IntCounter,
    elevation_cache_miss: IntCounter,
    elevation_lookup_failed: IntCounter,
}

impl Metrics {
    pub fn try_new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let samples_accepted = IntCounter::new(
            "runtrack_samples_accepted_total",
            "Fixes accepted into a session ledger",
        )?;
        let samples_rejected = IntCounterVec::new(
            Opts::new("runtrack_samples_rejected_total", "Fixes rejected by the session validity gate"),
            &["reason"],
        )?;
        let fixes_filtered = IntCounterVec::new(
            Opts::new("runtrack_fixes_filtered_total", "Raw fixes dropped by the sensor watch filter"),
            &["reason"],
        )?;
        let elevation_cache_hit = IntCounter::new(
            "runtrack_elevation_cache_hit_total",
            "Elevation lookups served from cache",
        )?;
        let elevation_cache_miss = IntCounter::new(
            "runtrack_elevation_cache_miss_total",
            "Elevation lookups sent to the provider",
        )?;
        let elevation_lookup_failed = IntCounter::new(
            "runtrack_elevation_lookup_failed_total",
            "Elevation batches that failed and fell back to unavailable",
        )?;

        registry.register(Box::new(samples_accepted.clone()))?;
        registry.register(Box::new(samples_rejected.clone()))?;
        registry.register(Box::new(fixes_filtered.clone()))?;
        registry.register(Box::new(elevation_cache_hit.clone()))?;
        registry.register(Box::new(elevation_cache_miss.clone()))?;
        registry.register(Box::new(elevation_lookup_failed.clone()))?;

        Ok(Self {
            registry,
            samples_accepted,
            samples_rejected,
            fixes_filtered,
            elevation_cache_hit,
            elevation_cache_miss,
            elevation_lookup_failed,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Tekstformat (Prometheus exposition).
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        if TextEncoder::new().encode(&self.registry.gather(), &mut buf).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

pub static METRICS: Lazy<Metrics> = Lazy::new(|| {
    // Navn og labels er statiske; feiler kun ved programmeringsfeil.
    Metrics::try_new().expect("static metric definitions are valid")
});

pub fn samples_accepted_total(metrics: &Metrics) -> &IntCounter {
    &metrics.samples_accepted
}

pub fn samples_rejected_total(metrics: &Metrics, reason: RejectReason) -> IntCounter {
    metrics.samples_rejected.with_label_values(&[reason.as_str()])
}

/// `reason`: "low_accuracy" | "min_movement" | "invalid_coordinates"
pub fn fixes_filtered_total(metrics: &Metrics, reason: &str) -> IntCounter {
    metrics.fixes_filtered.with_label_values(&[reason])
}

pub fn elevation_cache_hit_total(metrics: &Metrics) -> &IntCounter {
    &metrics.elevation_cache_hit
}

pub fn elevation_cache_miss_total(metrics: &Metrics) -> &IntCounter {
    &metrics.elevation_cache_miss
}

pub fn elevation_lookup_failed_total(metrics: &Metrics) -> &IntCounter {
    &metrics.elevation_lookup_failed
}
