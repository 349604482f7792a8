//! Sanntids sporing av løpeøkter: sensoradapter og øktmotor.

pub mod calories;
pub mod cli;
pub mod clock;
pub mod config;
pub mod elevation;
pub mod elevation_api;
pub mod error;
pub mod events;
pub mod metrics;
pub mod models;
pub mod physics;
pub mod sensor;
pub mod session;
pub mod smoothing;
pub mod storage;
pub mod tracker;
pub mod types;

#[cfg(feature = "python")]
mod py;

pub use crate::calories::estimate_calories;
pub use crate::cli::{parse_track_json, render_report, replay, run_replay};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::{SensorOptions, SessionConfig, TrackerConfig};
pub use crate::elevation::{ElevationClient, ElevationProvider, StaticElevationProvider};
pub use crate::elevation_api::OpenMeteoElevation;
pub use crate::error::{ElevationError, ReplayError, SensorError, StorageError, TrackError};
pub use crate::events::{ChannelObserver, ObserverId, SessionEvent, SessionObserver};
pub use crate::models::{
    DistanceUnit, Fix, Lap, Sample, Sex, SignalQuality, Totals, UserProfile,
};
pub use crate::physics::{haversine_km, RoundTo};
pub use crate::sensor::{
    LocationProvider, MovementFilter, SensorAdapter, StaticLocationProvider, WatchHandle,
};
pub use crate::session::{Session, SessionState};
pub use crate::storage::{load_config, load_profile, save_config, save_profile};
pub use crate::tracker::{FixSink, Tracker, TrackerSnapshot};
pub use crate::types::{
    Diagnostics, LiveStats, RejectReason, SampleOutcome, SensorStatus, SessionStateKind,
    SessionSummary,
};
