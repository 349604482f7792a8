use std::path::Path;

use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::TrackerConfig;
use crate::error::StorageError;
use crate::models::UserProfile;

fn read_json<T: DeserializeOwned>(path: &str) -> Result<Option<T>, StorageError> {
    if !Path::new(path).exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).map_err(|source| StorageError::Io {
        path: path.to_string(),
        source,
    })?;
    let de = &mut serde_json::Deserializer::from_str(&contents);
    let value = serde_path_to_error::deserialize(de).map_err(|e| StorageError::Json {
        path: path.to_string(),
        at: e.path().to_string(),
        message: e.inner().to_string(),
    })?;
    Ok(Some(value))
}

fn write_json<T: Serialize>(value: &T, path: &str) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| StorageError::Json {
        path: path.to_string(),
        at: String::new(),
        message: e.to_string(),
    })?;
    std::fs::write(path, json).map_err(|source| StorageError::Io {
        path: path.to_string(),
        source,
    })
}

/// Leser tracker-konfig fra disk (JSON) og validerer den.
/// Hvis filen ikke finnes, returneres standardkonfig.
pub fn load_config(path: &str) -> Result<TrackerConfig, StorageError> {
    let config = match read_json::<TrackerConfig>(path)? {
        Some(cfg) => {
            info!("config loaded from {path} (unit={})", cfg.session.unit.label());
            cfg
        }
        None => {
            warn!("no config at {path}, using defaults");
            TrackerConfig::default()
        }
    };
    config.validate()?;
    Ok(config)
}

/// Lagrer konfig (pretty-print). Ugyldig konfig skrives ikke.
pub fn save_config(config: &TrackerConfig, path: &str) -> Result<(), StorageError> {
    config.validate()?;
    write_json(config, path)?;
    info!("config saved to {path}");
    Ok(())
}

/// Leser brukerprofil; default-profil hvis filen mangler.
pub fn load_profile(path: &str) -> Result<UserProfile, StorageError> {
    match read_json::<UserProfile>(path)? {
        Some(profile) => {
            info!("profile loaded from {path} (weight={} kg)", profile.weight_kg);
            Ok(profile)
        }
        None => {
            warn!("no profile at {path}, returning default");
            Ok(UserProfile::default())
        }
    }
}

pub fn save_profile(profile: &UserProfile, path: &str) -> Result<(), StorageError> {
    write_json(profile, path)?;
    info!("profile saved to {path} (weight={} kg)", profile.weight_kg);
    Ok(())
}
