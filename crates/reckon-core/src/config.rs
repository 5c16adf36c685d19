//! Engine configuration
//!
//! One TOML file with a section per component: `[import]`, `[detection]`,
//! `[projection]`. Every key is optional and falls back to the default.
//!
//! ## Configuration Resolution
//!
//! 1. An explicit path, when given (it must exist)
//! 2. Override in data dir (~/.local/share/reckon/config/engine.toml)
//! 3. Embedded defaults (compiled into binary)

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::detect::DetectionConfig;
use crate::error::{Error, Result};
use crate::import::ImportConfig;
use crate::projection::ProjectionConfig;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/engine.toml");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub import: ImportConfig,
    pub detection: DetectionConfig,
    pub projection: ProjectionConfig,
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("reckon").join("config").join("engine.toml"))
}

impl EngineConfig {
    /// Load configuration (explicit path, then override, then embedded default)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(Error::NotFound(format!(
                    "config file {}",
                    path.display()
                )));
            }
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(default_path) if default_path.exists() => Self::from_file(&default_path),
            _ => Self::embedded(),
        }
    }

    /// The defaults shipped with the binary
    pub fn embedded() -> Result<Self> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the effective configuration
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        Regex::new(&self.import.payment_signature)
            .map_err(|e| Error::Config(format!("invalid payment_signature: {}", e)))?;

        if !(0.0..=1.0).contains(&self.import.inversion_threshold) {
            return Err(Error::Config(format!(
                "inversion_threshold must be between 0 and 1, got {}",
                self.import.inversion_threshold
            )));
        }
        if self.import.ambiguity_margin < 0.0 {
            return Err(Error::Config(
                "ambiguity_margin must not be negative".to_string(),
            ));
        }

        for band in &self.detection.bands {
            if band.min_days > band.max_days || band.min_days < 1 {
                return Err(Error::Config(format!(
                    "invalid {} band: {}..={} days",
                    band.frequency, band.min_days, band.max_days
                )));
            }
        }
        if self.detection.min_occurrences < 2 {
            return Err(Error::Config(
                "min_occurrences must be at least 2".to_string(),
            ));
        }
        for (name, value) in [
            ("income_min_confidence", self.detection.income_min_confidence),
            ("expense_min_confidence", self.detection.expense_min_confidence),
        ] {
            if value > 100 {
                return Err(Error::Config(format!(
                    "{} must be at most 100, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}
