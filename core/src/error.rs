use thiserror::Error;

/// Feil fra sensorlaget. Gjenopprettbare; UI bør forklare dem for brukeren.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("location sensor unavailable")]
    Unavailable,
    #[error("location permission denied")]
    PermissionDenied,
    #[error("timed out waiting for a location fix")]
    Timeout,
}

/// Eneste feil som stopper en økt: ugyldig konfig ved opprettelse.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[derive(Debug, Error)]
pub enum ElevationError {
    #[error("elevation request failed: {0}")]
    Http(String),
    #[error("could not decode elevation response: {0}")]
    Decode(String),
    #[error("elevation response had {got} values for {expected} points")]
    LengthMismatch { expected: usize, got: usize },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json in {path} at '{at}': {message}")]
    Json { path: String, at: String, message: String },
    #[error(transparent)]
    Config(#[from] TrackError),
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("invalid fix track at '{at}': {message}")]
    Parse { at: String, message: String },
    #[error(transparent)]
    Config(#[from] TrackError),
}
