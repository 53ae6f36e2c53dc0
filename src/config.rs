//! Batch Configuration - Fixed For A Whole Run
//!
//! Loaded from JSON (camelCase keys, every key optional) and overridden by
//! CLI flags. Values are validated on construction so a run never sees an
//! out-of-range quality or icon size.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const MIN_QUALITY: f32 = 0.5;
pub const MAX_QUALITY: f32 = 1.0;
pub const DEFAULT_QUALITY: f32 = 0.82;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Quality {0} is outside 0.5..=1.0")]
    QualityOutOfRange(f32),

    #[error("Icon size {0} is not one of 32, 64, 128, 256")]
    UnsupportedIconSize(u32),

    #[error("Unknown mode: {0}")]
    UnknownMode(String),

    #[error("Failed to read config {0}: {1}")]
    Io(String, #[source] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Output encoding selected for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Webp,
    Ico,
}

impl Mode {
    pub fn extension(self) -> &'static str {
        match self {
            Mode::Webp => "webp",
            Mode::Ico => "ico",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Mode::Webp => "image/webp",
            Mode::Ico => "image/x-icon",
        }
    }

    /// Name of the archive produced by a multi-item batch.
    pub fn archive_name(self) -> &'static str {
        match self {
            Mode::Webp => "webp-conversions.zip",
            Mode::Ico => "ico-icons.zip",
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webp" => Ok(Mode::Webp),
            "ico" => Ok(Mode::Ico),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Lossy encode quality, snapped to steps of 0.01.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Quality(f32);

impl Quality {
    pub fn new(value: f32) -> Result<Self, ConfigError> {
        if !value.is_finite() || !(MIN_QUALITY..=MAX_QUALITY).contains(&value) {
            return Err(ConfigError::QualityOutOfRange(value));
        }
        Ok(Self((value * 100.0).round() / 100.0))
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(DEFAULT_QUALITY)
    }
}

impl TryFrom<f32> for Quality {
    type Error = ConfigError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quality> for f32 {
    fn from(q: Quality) -> Self {
        q.0
    }
}

/// Pixel size of the square icon written by the ICO path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum IconSize {
    S32,
    S64,
    S128,
    #[default]
    S256,
}

impl IconSize {
    pub const ALL: [IconSize; 4] = [IconSize::S32, IconSize::S64, IconSize::S128, IconSize::S256];

    pub fn pixels(self) -> u32 {
        match self {
            IconSize::S32 => 32,
            IconSize::S64 => 64,
            IconSize::S128 => 128,
            IconSize::S256 => 256,
        }
    }
}

impl TryFrom<u32> for IconSize {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            32 => Ok(IconSize::S32),
            64 => Ok(IconSize::S64),
            128 => Ok(IconSize::S128),
            256 => Ok(IconSize::S256),
            other => Err(ConfigError::UnsupportedIconSize(other)),
        }
    }
}

impl From<IconSize> for u32 {
    fn from(size: IconSize) -> Self {
        size.pixels()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfig {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub icon_size: IconSize,
}

impl BatchConfig {
    pub fn new(mode: Mode) -> Self {
        Self { mode, ..Self::default() }
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e))?;
        Self::from_json(&content)
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_icon_size(mut self, icon_size: IconSize) -> Self {
        self.icon_size = icon_size;
        self
    }
}
