//! Viewer configuration
//!
//! Settings can be loaded from a JSON file, overridden from environment
//! variables, or built programmatically. Missing keys fall back to defaults.

use crate::grouping::DEFAULT_GROUP_TOLERANCE;
use crate::visibility::LayerFlag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_GROUP_TOLERANCE: &str = "OVERLAY_VIEWER_GROUP_TOLERANCE";
const ENV_ZOOM_STEP: &str = "OVERLAY_VIEWER_ZOOM_STEP";
const ENV_WORD_CACHE_PAGES: &str = "OVERLAY_VIEWER_WORD_CACHE_PAGES";

/// Zoom limits and step for zoom in / zoom out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub initial: f64,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self { initial: 1.0, min: 0.1, max: 5.0, step: 0.2 }
    }
}

impl ZoomConfig {
    pub fn clamp(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Midline distance within which records count as one line
    pub group_tolerance: f64,

    /// Whether same-line grouping is applied to highlights
    pub grouping_enabled: bool,

    pub zoom: ZoomConfig,

    /// Vertical offset of the page raster inside the view, in pixels
    pub page_padding: f64,

    /// Maximum pages kept in the word cache; `None` keeps every visited page
    pub word_cache_capacity: Option<usize>,

    /// Initial layer visibility, keyed by flag name
    pub layers: BTreeMap<String, bool>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        let layers = [
            (LayerFlag::TextLayer, false),
            (LayerFlag::AnnotationLayer, false),
            (LayerFlag::LiveCoordinates, true),
        ]
        .into_iter()
        .map(|(flag, visible)| (flag.name().to_string(), visible))
        .collect();

        Self {
            group_tolerance: DEFAULT_GROUP_TOLERANCE,
            grouping_enabled: true,
            zoom: ZoomConfig::default(),
            page_padding: 30.0,
            word_cache_capacity: None,
            layers,
        }
    }
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ViewerConfig {
    /// Default config location for the current platform.
    ///
    /// - Linux: ~/.config/overlay-viewer/config.json
    /// - macOS: ~/Library/Application Support/overlay-viewer/config.json
    /// - Windows: %APPDATA%\overlay-viewer\config.json
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("overlay-viewer"))
            .unwrap_or_else(|| PathBuf::from(".overlay-viewer"))
            .join("config.json")
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()
    }

    /// Write to `path` through a temp file and a rename.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Defaults overridden from the process environment.
    ///
    /// - `OVERLAY_VIEWER_GROUP_TOLERANCE`: grouping tolerance (`,` or `.` decimal)
    /// - `OVERLAY_VIEWER_ZOOM_STEP`: zoom step
    /// - `OVERLAY_VIEWER_WORD_CACHE_PAGES`: word cache capacity in pages
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let invalid =
            |key: &str, value: &str| ConfigError::InvalidValue { key: key.into(), value: value.into() };

        if let Some(value) = lookup(ENV_GROUP_TOLERANCE) {
            self.group_tolerance = crate::grouping::parse_tolerance(&value)
                .ok_or_else(|| invalid(ENV_GROUP_TOLERANCE, &value))?;
        }

        if let Some(value) = lookup(ENV_ZOOM_STEP) {
            self.zoom.step = crate::decimal::parse_decimal(&value)
                .filter(|step| *step > 0.0)
                .ok_or_else(|| invalid(ENV_ZOOM_STEP, &value))?;
        }

        if let Some(value) = lookup(ENV_WORD_CACHE_PAGES) {
            let pages =
                value.trim().parse::<usize>().map_err(|_| invalid(ENV_WORD_CACHE_PAGES, &value))?;
            self.word_cache_capacity = (pages > 0).then_some(pages);
        }

        self.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        let invalid = |key: &str, value: f64| ConfigError::InvalidValue {
            key: key.into(),
            value: value.to_string(),
        };

        if !(self.group_tolerance.is_finite() && self.group_tolerance >= 0.0) {
            return Err(invalid("group_tolerance", self.group_tolerance));
        }
        if !(self.zoom.min > 0.0 && self.zoom.min <= self.zoom.max) {
            return Err(invalid("zoom.min", self.zoom.min));
        }
        if !(self.zoom.step > 0.0) {
            return Err(invalid("zoom.step", self.zoom.step));
        }

        Ok(self)
    }

    /// Initial layer visibility as typed flags; unknown names are dropped.
    pub fn initial_layers(&self) -> Vec<(LayerFlag, bool)> {
        self.layers
            .iter()
            .filter_map(|(name, visible)| LayerFlag::from_name(name).map(|flag| (flag, *visible)))
            .collect()
    }

    pub fn with_group_tolerance(mut self, tolerance: f64) -> Self {
        self.group_tolerance = tolerance;
        self
    }

    pub fn with_word_cache_capacity(mut self, pages: Option<usize>) -> Self {
        self.word_cache_capacity = pages;
        self
    }
}
