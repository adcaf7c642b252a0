//! Configuration for motionvis-rs
//!
//! A single TOML file holds every tunable, grouped into sections:
//!
//! ```toml
//! [stream]
//! channels = ["X", "Y", "Z"]
//!
//! [render]
//! window_points = 800
//! max_step = 20
//! tick_ms = 120
//!
//! [flush]
//! window_secs = 10.0
//! min_samples = 15
//! poll_ms = 1000
//! max_samples = 0
//! on_shutdown = true
//!
//! [output]
//! dir = "data"
//! format = "csv"
//!
//! [source]
//! kind = "mock"
//! rate_hz = 50.0
//!
//! [logging]
//! filter = "info,motionvis_rs=debug"
//! ```
//!
//! # Config Location
//!
//! The default file lives in the platform config directory:
//! - **Linux**: `~/.config/dev.motionvis.motionvis-rs/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.motionvis.motionvis-rs/config.toml`
//! - **Windows**: `%APPDATA%\dev.motionvis.motionvis-rs\config.toml`

pub mod settings;

pub use settings::*;

use crate::error::{MotionVisError, Result};
use crate::types::ChannelSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "dev.motionvis.motionvis-rs";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Get the application config directory path
pub fn app_config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    app_config_dir().map(|p| p.join(CONFIG_FILE))
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub stream: StreamSettings,
    pub render: RenderSettings,
    pub flush: FlushConfig,
    pub output: OutputSettings,
    pub source: SourceSettings,
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MotionVisError::Config(format!("Failed to read config {:?}: {}", path, e))
        })?;
        let config = Self::from_toml(&content)
            .map_err(|e| e.with_context(format!("Invalid config {:?}", path)))?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Load a config file, falling back to defaults if it is missing or invalid
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config as TOML, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                MotionVisError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }
        std::fs::write(path, self.to_toml()?).map_err(|e| {
            MotionVisError::Config(format!("Failed to write config {:?}: {}", path, e))
        })
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| MotionVisError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            MotionVisError::Serialization(format!("Failed to serialize config: {}", e))
        })
    }

    /// The configured channel set
    pub fn channel_set(&self) -> Result<ChannelSet> {
        ChannelSet::new(self.stream.channels.iter().cloned())
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.channel_set()?;

        let invalid = |msg: &str| Err(MotionVisError::Config(msg.to_string()));
        if self.render.max_step == 0 {
            return invalid("render.max_step must be at least 1");
        }
        if self.render.window_points == 0 {
            return invalid("render.window_points must be at least 1");
        }
        if self.render.tick_ms == 0 {
            return invalid("render.tick_ms must be non-zero");
        }
        self.flush.window_duration()?;
        if self.flush.poll_ms == 0 {
            return invalid("flush.poll_ms must be non-zero");
        }
        if self.source.kind == SourceKind::Mock {
            self.source.sample_period()?;
        }
        Ok(())
    }
}
