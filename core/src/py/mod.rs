// Python-binding (feature "python"). Alt går som JSON-strenger ut,
// slik at Python-siden slipper å kjenne Rust-typene.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::wrap_pyfunction;

use serde_path_to_error as spte;

use crate::cli::{parse_track_json, replay};
use crate::config::SessionConfig;
use crate::models::Fix;
use crate::session::Session;
use crate::types::SampleOutcome;

fn to_py_err<E: std::fmt::Display>(e: E) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn parse_config(json_in: &str) -> PyResult<SessionConfig> {
    let de = &mut serde_json::Deserializer::from_str(json_in);
    spte::deserialize(de)
        .map_err(|e| PyValueError::new_err(format!("config at '{}': {}", e.path(), e.inner())))
}

#[pyclass(name = "Session")]
pub struct PySession {
    inner: Session,
}

#[pymethods]
impl PySession {
    #[new]
    #[pyo3(signature = (config_json = None))]
    fn new(config_json: Option<&str>) -> PyResult<Self> {
        let config = match config_json {
            Some(s) => parse_config(s)?,
            None => SessionConfig::default(),
        };
        let inner = Session::new(config).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[getter]
    fn id(&self) -> String {
        self.inner.id().to_string()
    }

    #[getter]
    fn state(&self) -> PyResult<String> {
        serde_json::to_value(self.inner.state().kind())
            .map(|v| v.as_str().unwrap_or_default().to_string())
            .map_err(to_py_err)
    }

    fn start(&mut self) -> bool {
        self.inner.start()
    }

    fn pause(&mut self) -> bool {
        self.inner.pause()
    }

    fn resume(&mut self) -> bool {
        self.inner.resume()
    }

    fn reset(&mut self) {
        self.inner.reset()
    }

    /// Returnerer "accepted", avvisningsgrunn, eller "ignored".
    #[pyo3(signature = (lat, lon, timestamp_ms, accuracy_m = None, altitude_m = None, speed_mps = None))]
    fn add_fix(
        &mut self,
        lat: f64,
        lon: f64,
        timestamp_ms: u64,
        accuracy_m: Option<f64>,
        altitude_m: Option<f64>,
        speed_mps: Option<f64>,
    ) -> String {
        let fix = Fix { lat, lon, timestamp_ms, accuracy_m, altitude_m, speed_mps };
        match self.inner.add_sample(fix) {
            SampleOutcome::Accepted { .. } => "accepted".to_string(),
            SampleOutcome::Rejected(reason) => reason.as_str().to_string(),
            SampleOutcome::Ignored(_) => "ignored".to_string(),
        }
    }

    fn apply_elevation(&mut self, index: usize, elevation_m: f64) -> bool {
        self.inner.apply_elevation(index, elevation_m)
    }

    fn stats_json(&self) -> PyResult<String> {
        serde_json::to_string(&self.inner.stats()).map_err(to_py_err)
    }

    fn stop(&mut self) -> PyResult<String> {
        serde_json::to_string(&self.inner.stop()).map_err(to_py_err)
    }
}

/// Spiller et JSON-spor gjennom en ny økt og returnerer sluttrapporten.
#[pyfunction]
fn replay_json(json_in: &str) -> PyResult<String> {
    let input = parse_track_json(json_in).map_err(to_py_err)?;
    let summary = replay(&input.fixes, input.config).map_err(to_py_err)?;
    serde_json::to_string(&summary).map_err(to_py_err)
}

#[pymodule]
fn runtrack_core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PySession>()?;
    m.add_function(wrap_pyfunction!(replay_json, m)?)?;
    Ok(())
}
