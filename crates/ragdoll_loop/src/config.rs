use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::app::{
    parse_sequence, LoopConfig, PhysicsParams, ProjectionConfig, SessionConfig,
    StabilizerSettings, Viewport,
};

pub const CONFIG_ENV_VAR: &str = "RAGDOLL_CONFIG";
pub const SEQUENCE_ENV_VAR: &str = "RAGDOLL_SEQUENCE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config json: {message}")]
    Parse { message: String },
    #[error("parse config json at {path}: {message}")]
    ParseAt { path: String, message: String },
    #[error("invalid config value at {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopSettings {
    pub tick_rate_hz: u32,
    pub max_frame_delta_ms: u64,
    pub max_ticks_per_advance: u32,
    pub metrics_log_interval_ms: u64,
}

impl Default for LoopSettings {
    fn default() -> Self {
        let defaults = LoopConfig::default();
        Self {
            tick_rate_hz: defaults.tick_rate_hz,
            max_frame_delta_ms: defaults.max_frame_delta.as_millis() as u64,
            max_ticks_per_advance: defaults.max_ticks_per_advance,
            metrics_log_interval_ms: defaults.metrics_log_interval.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Ragdoll Runner".to_string(),
            width: 1000,
            height: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    #[serde(rename = "loop")]
    pub timing: LoopSettings,
    pub window: WindowSettings,
    pub physics: PhysicsParams,
    pub angle_stabilizer: StabilizerSettings,
    pub height_stabilizer: StabilizerSettings,
    pub projection: ProjectionConfig,
    /// Comma-separated hold durations replayed right after startup.
    pub sequence: Option<String>,
}

impl AppConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let config = match serde_path_to_error::deserialize::<_, AppConfig>(&mut deserializer) {
            Ok(config) => config,
            Err(error) => {
                let path = error.path().to_string();
                let message = error.into_inner().to_string();
                return Err(if path.is_empty() || path == "." {
                    ConfigError::Parse { message }
                } else {
                    ConfigError::ParseAt { path, message }
                });
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.tick_rate_hz == 0 {
            return Err(invalid("loop.tick_rate_hz", "must be positive"));
        }
        if self.timing.max_ticks_per_advance == 0 {
            return Err(invalid("loop.max_ticks_per_advance", "must be positive"));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(invalid("window", "width and height must be positive"));
        }
        require_positive("projection.pixels_per_world", self.projection.pixels_per_world)?;
        require_positive("projection.dash_spacing_px", self.projection.dash_spacing_px)?;
        require_finite("physics.gravity", self.physics.gravity)?;
        require_finite("physics.torque_multiplier", self.physics.torque_multiplier)?;
        require_finite("physics.inertia_multiplier", self.physics.inertia_multiplier)?;
        require_finite("angle_stabilizer.strength", self.angle_stabilizer.strength)?;
        require_finite("height_stabilizer.strength", self.height_stabilizer.strength)?;
        if let Some(sequence) = &self.sequence {
            parse_sequence(sequence).map_err(|error| invalid("sequence", error.to_string()))?;
        }
        Ok(())
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            tick_rate_hz: self.timing.tick_rate_hz,
            max_frame_delta: Duration::from_millis(self.timing.max_frame_delta_ms),
            max_ticks_per_advance: self.timing.max_ticks_per_advance,
            metrics_log_interval: Duration::from_millis(self.timing.metrics_log_interval_ms),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            physics: self.physics,
            angle_stabilizer: self.angle_stabilizer,
            height_stabilizer: self.height_stabilizer,
            projection: self.projection,
            viewport: Viewport {
                width: self.window.width,
                height: self.window.height,
            },
        }
    }
}

/// Defaults, overlaid by the file named in `RAGDOLL_CONFIG` and the
/// sequence in `RAGDOLL_SEQUENCE` when those are set.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    let mut config = match read_env(CONFIG_ENV_VAR)? {
        Some(raw_path) => {
            let path = PathBuf::from(raw_path);
            let config = AppConfig::from_path(&path)?;
            info!(path = %path.display(), "config_loaded");
            config
        }
        None => AppConfig::default(),
    };
    if let Some(sequence) = read_env(SEQUENCE_ENV_VAR)? {
        config.sequence = Some(sequence);
        config.validate()?;
    }
    Ok(config)
}

fn read_env(var: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(var) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(source) => Err(ConfigError::EnvVar { var, source }),
    }
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

fn require_finite(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, format!("expected finite number, got {value}")))
    }
}

fn require_positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("expected positive number, got {value}")))
    }
}
