//! Editor configuration.
//!
//! Configuration can be loaded from a TOML file, environment variables, or
//! built programmatically. Missing keys keep their defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// User-tunable editor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Smallest zoom factor the viewport accepts
    pub zoom_min: f32,
    /// Largest zoom factor the viewport accepts
    pub zoom_max: f32,
    /// Zoom in/out increment
    pub zoom_step: f32,
    /// Signature placement box, document units
    pub signature_width: f32,
    pub signature_height: f32,
    /// Initials placement box, document units
    pub initials_width: f32,
    pub initials_height: f32,
    /// Highlight fill opacity, 0-255
    pub highlight_alpha: u8,
    /// Undo depth; the oldest entries drop first
    pub history_limit: usize,
    /// TrueType/OpenType font for the preview. Unset or unusable means the
    /// built-in bitmap font.
    pub font_path: Option<PathBuf>,
    /// Extra grab margin around shapes, view pixels
    pub shape_hit_margin: f32,
    /// Height of the stamp date line in the hit region, view pixels
    pub stamp_date_extent: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            zoom_min: 0.25,
            zoom_max: 5.0,
            zoom_step: 0.25,
            signature_width: 150.0,
            signature_height: 50.0,
            initials_width: 60.0,
            initials_height: 30.0,
            highlight_alpha: 100,
            history_limit: 100,
            font_path: None,
            shape_hit_margin: 5.0,
            stamp_date_extent: 15.0,
        }
    }
}

const ENV_ZOOM_STEP: &str = "ANNOTATOR_ZOOM_STEP";
const ENV_HIGHLIGHT_ALPHA: &str = "ANNOTATOR_HIGHLIGHT_ALPHA";
const ENV_HISTORY_LIMIT: &str = "ANNOTATOR_HISTORY_LIMIT";
const ENV_FONT: &str = "ANNOTATOR_FONT";

impl EditorConfig {
    pub fn with_zoom_range(mut self, min: f32, max: f32) -> Self {
        self.zoom_min = min;
        self.zoom_max = max;
        self
    }

    pub fn with_zoom_step(mut self, step: f32) -> Self {
        self.zoom_step = step;
        self
    }

    pub fn with_signature_box(mut self, width: f32, height: f32) -> Self {
        self.signature_width = width;
        self.signature_height = height;
        self
    }

    pub fn with_initials_box(mut self, width: f32, height: f32) -> Self {
        self.initials_width = width;
        self.initials_height = height;
        self
    }

    pub fn with_highlight_alpha(mut self, alpha: u8) -> Self {
        self.highlight_alpha = alpha;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_font_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.font_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// - `ANNOTATOR_ZOOM_STEP`: zoom increment (default 0.25)
    /// - `ANNOTATOR_HIGHLIGHT_ALPHA`: highlight opacity 0-255 (default 100)
    /// - `ANNOTATOR_HISTORY_LIMIT`: undo depth (default 100)
    /// - `ANNOTATOR_FONT`: preview font path
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var(ENV_ZOOM_STEP) {
            config.zoom_step = parse_env(ENV_ZOOM_STEP, &val)?;
        }
        if let Ok(val) = std::env::var(ENV_HIGHLIGHT_ALPHA) {
            config.highlight_alpha = parse_env(ENV_HIGHLIGHT_ALPHA, &val)?;
        }
        if let Ok(val) = std::env::var(ENV_HISTORY_LIMIT) {
            config.history_limit = parse_env(ENV_HISTORY_LIMIT, &val)?;
        }
        if let Ok(val) = std::env::var(ENV_FONT) {
            config.font_path = Some(PathBuf::from(val));
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// ```toml
    /// zoom_step = 0.5
    /// highlight_alpha = 120
    /// font_path = "/usr/share/fonts/TTF/DejaVuSans.ttf"
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Rejects values the editor cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |v: f32| v.is_finite() && v > 0.0;

        if !positive(self.zoom_min) || !positive(self.zoom_max) || self.zoom_min > self.zoom_max {
            return Err(ConfigError::InvalidValue("zoom_min/zoom_max".into()));
        }
        if !positive(self.zoom_step) {
            return Err(ConfigError::InvalidValue("zoom_step".into()));
        }
        if !positive(self.signature_width) || !positive(self.signature_height) {
            return Err(ConfigError::InvalidValue("signature box".into()));
        }
        if !positive(self.initials_width) || !positive(self.initials_height) {
            return Err(ConfigError::InvalidValue("initials box".into()));
        }
        if self.history_limit == 0 {
            return Err(ConfigError::InvalidValue("history_limit".into()));
        }
        if !(self.shape_hit_margin.is_finite() && self.shape_hit_margin >= 0.0) {
            return Err(ConfigError::InvalidValue("shape_hit_margin".into()));
        }
        if !(self.stamp_date_extent.is_finite() && self.stamp_date_extent >= 0.0) {
            return Err(ConfigError::InvalidValue("stamp_date_extent".into()));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}
