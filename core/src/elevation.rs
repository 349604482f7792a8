use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use ordered_float::OrderedFloat;

use crate::error::ElevationError;
use crate::metrics::{
    elevation_cache_hit_total, elevation_cache_miss_total, elevation_lookup_failed_total, Metrics,
    METRICS,
};
use crate::physics::RoundTo;

/// Maks antall punkter per kall mot tjenesten.
pub const MAX_BATCH: usize = 100;
/// Cache-nøkkel rundes til 4 desimaler (~11 m rutenett).
pub const CACHE_DECIMALS: u32 = 4;

/// Høydetjeneste: (lat, lon) → meter over havet, én verdi per punkt.
pub trait ElevationProvider: Send + Sync {
    fn lookup(&self, points: &[(f64, f64)]) -> Result<Vec<f64>, ElevationError>;
}

type CacheKey = (OrderedFloat<f64>, OrderedFloat<f64>);

fn cache_key(lat: f64, lon: f64) -> CacheKey {
    (OrderedFloat(lat.round_to(CACHE_DECIMALS)), OrderedFloat(lon.round_to(CACHE_DECIMALS)))
}

/// Batching + cache foran en `ElevationProvider`. Feil gir `None` for de
/// berørte punktene, aldri en feil til kalleren.
pub struct ElevationClient {
    provider: Arc<dyn ElevationProvider>,
    cache: Mutex<HashMap<CacheKey, f64>>,
    batch_size: usize,
    metrics: &'static Metrics,
}

impl ElevationClient {
    pub fn new(provider: Arc<dyn ElevationProvider>) -> Self {
        Self {
            provider,
            cache: Mutex::new(HashMap::new()),
            batch_size: MAX_BATCH,
            metrics: &*METRICS,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH);
        self
    }

    pub fn cached_points(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn lookup(&self, points: &[(f64, f64)]) -> Vec<Option<f64>> {
        let keys: Vec<CacheKey> = points.iter().map(|&(lat, lon)| cache_key(lat, lon)).collect();

        // unike nøkler som ikke finnes i cache
        let mut misses: Vec<CacheKey> = Vec::new();
        {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            for key in &keys {
                if cache.contains_key(key) {
                    elevation_cache_hit_total(self.metrics).inc();
                } else if !misses.contains(key) {
                    misses.push(*key);
                }
            }
        }

        for chunk in misses.chunks(self.batch_size) {
            elevation_cache_miss_total(self.metrics).inc_by(chunk.len() as u64);
            let query: Vec<(f64, f64)> = chunk.iter().map(|(la, lo)| (la.0, lo.0)).collect();

            match self.provider.lookup(&query) {
                Ok(values) if values.len() == chunk.len() => {
                    let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
                    for (key, v) in chunk.iter().zip(values) {
                        if v.is_finite() {
                            cache.insert(*key, v);
                        }
                    }
                    debug!("elevation batch of {} points cached", chunk.len());
                }
                Ok(values) => {
                    elevation_lookup_failed_total(self.metrics).inc();
                    warn!(
                        "{}",
                        ElevationError::LengthMismatch { expected: chunk.len(), got: values.len() }
                    );
                }
                Err(e) => {
                    elevation_lookup_failed_total(self.metrics).inc();
                    warn!("elevation lookup failed for {} points: {e}", chunk.len());
                }
            }
        }

        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        keys.iter().map(|k| cache.get(k).copied()).collect()
    }

    pub fn lookup_one(&self, lat: f64, lon: f64) -> Option<f64> {
        self.lookup(&[(lat, lon)]).into_iter().next().flatten()
    }
}

/// Fire-and-forget: slår opp høyde i egen tråd og leverer
/// `(sample-indeks, høyde)` til `deliver`. Blokkerer aldri kalleren.
pub fn spawn_refinement<F>(
    client: Arc<ElevationClient>,
    requests: Vec<(usize, f64, f64)>,
    deliver: F,
) -> JoinHandle<()>
where
    F: FnOnce(Vec<(usize, Option<f64>)>) + Send + 'static,
{
    thread::spawn(move || {
        let points: Vec<(f64, f64)> = requests.iter().map(|&(_, lat, lon)| (lat, lon)).collect();
        let values = client.lookup(&points);
        let updates = requests.iter().map(|r| r.0).zip(values).collect();
        deliver(updates);
    })
}

/// Statisk leverandør (test/fallback): samme høyde overalt, eller feil.
#[derive(Debug, Clone, Default)]
pub struct StaticElevationProvider {
    pub elevation_m: Option<f64>,
}

impl ElevationProvider for StaticElevationProvider {
    fn lookup(&self, points: &[(f64, f64)]) -> Result<Vec<f64>, ElevationError> {
        match self.elevation_m {
            Some(e) => Ok(vec![e; points.len()]),
            None => Err(ElevationError::Http("static provider has no elevation".into())),
        }
    }
}
