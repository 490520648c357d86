use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::state::ReaderSettings;

const SETTINGS_FILE: &str = "settings.json";

fn settings_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Cannot find config directory")?;
    Ok(config_dir.join("ReadToMe").join(SETTINGS_FILE))
}

/// Load persisted settings, falling back to defaults on any failure.
pub fn load_settings() -> ReaderSettings {
    let path = match settings_path() {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("Failed to locate settings file: {}. Using defaults.", e);
            return ReaderSettings::default();
        }
    };

    if !path.exists() {
        tracing::info!("No stored settings found. Using defaults.");
        return ReaderSettings::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(data) => match serde_json::from_str::<ReaderSettings>(&data) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Failed to deserialize stored settings: {}. Using defaults.", e);
                ReaderSettings::default()
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read settings file: {}. Using defaults.", e);
            ReaderSettings::default()
        }
    }
}

pub fn save_settings(settings: &ReaderSettings) -> Result<()> {
    let path = settings_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let data = serde_json::to_string_pretty(settings)?;
    std::fs::write(&path, data)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
