//! Engine configuration.
//!
//! Every tunable of the engine lives in [`EngineConfig`]. The defaults are
//! the values the engine was tuned with on 100 Hz-class phone sensors:
//! a 3000-sample calibration window, a ±5% acceptance band, a 5-sample
//! reacquisition run, a 0.06 rad dead zone and a 100 ms report interval.
//!
//! Configuration can be built in code or loaded from TOML. Missing keys fall
//! back to the defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for '{field}': {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Parameters for the sampling engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample count (both sensors) closing the calibration window. Also the
    /// step by which the window is extended when no accelerometer sample
    /// arrived in time.
    pub calibration_samples: u64,

    /// Half-width of the acceptance band as a fraction of the calibrated
    /// gravity magnitude.
    pub band_tolerance: f64,

    /// Consecutive in-band accelerometer samples required before the
    /// gravity estimate is snapped to the live reading.
    pub reacquisition_run: u32,

    /// Incremental gyro angles (rad) with a smaller magnitude are treated
    /// as noise.
    pub gyro_dead_zone: f64,

    /// Minimum wall-clock spacing between two diff reports (ms).
    pub diff_interval_ms: u64,

    /// Samples between two progress notifications.
    pub progress_interval: u64,

    /// Debug capture file. Capture is disabled when unset.
    pub capture_path: Option<PathBuf>,

    /// Per-axis gravity change needed before another `simul` capture line
    /// is written.
    pub capture_gravity_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            calibration_samples: 3000,
            band_tolerance: 0.05,
            reacquisition_run: 5,
            gyro_dead_zone: 0.06,
            diff_interval_ms: 100,
            progress_interval: 1000,
            capture_path: None,
            capture_gravity_threshold: 0.1,
        }
    }
}

impl EngineConfig {
    /// Parses a TOML document. The result is validated.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file. The result is validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded engine configuration from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Checks every field for a value the engine can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.calibration_samples == 0 {
            return Err(invalid("calibration_samples", "must be greater than zero"));
        }
        if !(self.band_tolerance > 0.0 && self.band_tolerance < 1.0) {
            return Err(invalid(
                "band_tolerance",
                format!("{} is outside (0, 1)", self.band_tolerance),
            ));
        }
        if self.reacquisition_run == 0 {
            return Err(invalid("reacquisition_run", "must be greater than zero"));
        }
        if !self.gyro_dead_zone.is_finite() || self.gyro_dead_zone < 0.0 {
            return Err(invalid(
                "gyro_dead_zone",
                format!("{} is not a finite non-negative angle", self.gyro_dead_zone),
            ));
        }
        if self.progress_interval == 0 {
            return Err(invalid("progress_interval", "must be greater than zero"));
        }
        if !self.capture_gravity_threshold.is_finite() || self.capture_gravity_threshold < 0.0 {
            return Err(invalid(
                "capture_gravity_threshold",
                format!("{} is not a finite non-negative value", self.capture_gravity_threshold),
            ));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.calibration_samples, 3000);
        assert_eq!(config.band_tolerance, 0.05);
        assert_eq!(config.reacquisition_run, 5);
        assert_eq!(config.gyro_dead_zone, 0.06);
        assert_eq!(config.diff_interval_ms, 100);
        assert_eq!(config.progress_interval, 1000);
        assert!(config.capture_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            calibration_samples = 500
            diff_interval_ms = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.calibration_samples, 500);
        assert_eq!(config.diff_interval_ms, 50);
        assert_eq!(config.reacquisition_run, 5);
        assert_eq!(config.band_tolerance, 0.05);
    }

    #[test]
    fn test_capture_path_from_toml() {
        let config = EngineConfig::from_toml_str(r#"capture_path = "/tmp/capture.csv""#).unwrap();
        assert_eq!(config.capture_path, Some(PathBuf::from("/tmp/capture.csv")));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = EngineConfig::from_toml_str("calibration_samples = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "calibration_samples", .. }));

        let err = EngineConfig::from_toml_str("band_tolerance = 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "band_tolerance", .. }));

        let err = EngineConfig::from_toml_str("gyro_dead_zone = -0.1").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "gyro_dead_zone", .. }));

        let err = EngineConfig::from_toml_str("reacquisition_run = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "reacquisition_run", .. }));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = EngineConfig::from_toml_str("calibration_samples = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "progress_interval = 250").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.progress_interval, 250);
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load("/nonexistent/gyroaccel.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
