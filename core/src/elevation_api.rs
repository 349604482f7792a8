// core/src/elevation_api.rs
use serde::Deserialize;
use ureq::Agent;

use crate::elevation::ElevationProvider;
use crate::error::ElevationError;

const OPEN_METEO_ELEVATION_URL: &str = "https://api.open-meteo.com/v1/elevation";

#[derive(Debug, Clone, Deserialize)]
struct OpenMeteoElevationResp {
    elevation: Vec<f64>,
}

/// Open-Meteo høydeklient – enkel blocking-versjon (ureq).
/// Tar inntil 100 koordinater per kall.
pub struct OpenMeteoElevation {
    agent: Agent,
    base_url: String,
}

impl OpenMeteoElevation {
    pub fn new() -> Self {
        Self::with_base_url(OPEN_METEO_ELEVATION_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        // En enkel agent; ureq bruker rustls når "tls" er aktivert
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(10))
            .build();
        Self { agent, base_url: base_url.trim_end_matches('/').to_string() }
    }

    fn url_for(&self, points: &[(f64, f64)]) -> String {
        let lats: Vec<String> = points.iter().map(|(lat, _)| format!("{lat:.5}")).collect();
        let lons: Vec<String> = points.iter().map(|(_, lon)| format!("{lon:.5}")).collect();
        format!(
            "{}?latitude={}&longitude={}",
            self.base_url,
            lats.join(","),
            lons.join(",")
        )
    }
}

impl Default for OpenMeteoElevation {
    fn default() -> Self {
        Self::new()
    }
}

impl ElevationProvider for OpenMeteoElevation {
    fn lookup(&self, points: &[(f64, f64)]) -> Result<Vec<f64>, ElevationError> {
        if points.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.url_for(points);

        let resp = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| ElevationError::Http(e.to_string()))?;
        let body: OpenMeteoElevationResp = resp
            .into_json()
            .map_err(|e| ElevationError::Decode(e.to_string()))?;

        if body.elevation.len() != points.len() {
            return Err(ElevationError::LengthMismatch {
                expected: points.len(),
                got: body.elevation.len(),
            });
        }

        log::debug!("[OpenMeteo] {} elevation points fetched", points.len());
        Ok(body.elevation)
    }
}
