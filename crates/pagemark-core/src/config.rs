//! Editor configuration.

use crate::history::MAX_UNDO_HISTORY;
use crate::storage::DEFAULT_AUTOSAVE_DEBOUNCE_MS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Tunable editor settings. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Multiplier applied by zoom in / zoom out.
    pub zoom_step: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub device_pixel_ratio: f64,
    /// Default eraser stroke width in base units.
    pub eraser_size: f64,
    /// Default pencil stroke width in base units.
    pub pencil_size: f64,
    /// Default highlighter stroke width in base units.
    pub highlight_size: f64,
    /// Padding (display pixels) left around the page by fit-to-width/height.
    pub fit_padding: f64,
    /// Quiet period after the last change before autosaving.
    pub autosave_debounce_ms: u64,
    /// Largest record the primary store accepts, in bytes.
    pub storage_budget_bytes: usize,
    /// Maximum undo entries; 0 keeps everything.
    pub undo_limit: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            zoom_step: 1.25,
            min_zoom: 0.1,
            max_zoom: 10.0,
            device_pixel_ratio: 1.0,
            eraser_size: 20.0,
            pencil_size: 2.0,
            highlight_size: 16.0,
            fit_padding: 40.0,
            autosave_debounce_ms: DEFAULT_AUTOSAVE_DEBOUNCE_MS,
            storage_budget_bytes: 5 * 1024 * 1024,
            undo_limit: MAX_UNDO_HISTORY,
        }
    }
}

impl EditorConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_zoom > 0.0 && self.min_zoom <= self.max_zoom) {
            return Err(ConfigError::Invalid(format!(
                "zoom range {}..{} is empty",
                self.min_zoom, self.max_zoom
            )));
        }
        if !(self.zoom_step > 1.0) {
            return Err(ConfigError::Invalid(format!("zoom_step {} must exceed 1", self.zoom_step)));
        }
        if !(self.device_pixel_ratio > 0.0 && self.device_pixel_ratio.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "device_pixel_ratio {} must be positive",
                self.device_pixel_ratio
            )));
        }
        Ok(())
    }
}
