// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine configuration.
//!
//! All timing tunables live here and are stored as RON next to the
//! walkthrough they apply to.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "waypoint.ron";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid RON
    #[error("Failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Config could not be serialized
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),

    /// A value is out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Tunables for trigger detection, media interruption and authoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Forward window after a trigger's timestamp in which it may fire
    pub trigger_tolerance_secs: f64,
    /// Minimum separation between the last fire and another trigger
    pub debounce_window_secs: f64,
    /// Delay between effect completion and media resume
    pub resume_grace_ms: u64,
    /// How far before an incomplete trigger a blocked seek lands
    pub seek_clamp_margin_secs: f64,
    /// Whether the viewer may seek freely
    pub allow_seeking: bool,
    /// Whether unanswered quizzes block seeking past them
    pub enforce_quiz_completion: bool,
    /// Poll period of the wall-clock cursor for timeline hotspots
    pub timeline_poll_ms: u64,
    /// Authoring undo depth
    pub history_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trigger_tolerance_secs: 0.5,
            debounce_window_secs: 1.0,
            resume_grace_ms: 500,
            seek_clamp_margin_secs: 1.0,
            allow_seeking: false,
            enforce_quiz_completion: true,
            timeline_poll_ms: 100,
            history_depth: 100,
        }
    }
}

impl EngineConfig {
    /// Load from a RON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = ron::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Loaded engine config from {:?}", path);
        Ok(config)
    }

    /// Save to a RON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let pretty = ron::ser::PrettyConfig::default().struct_names(true);
        let content = ron::ser::to_string_pretty(self, pretty)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the engine can not run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.trigger_tolerance_secs.is_finite() || self.trigger_tolerance_secs <= 0.0 {
            return Err(ConfigError::Invalid(
                "trigger_tolerance_secs must be positive".to_string(),
            ));
        }
        if !self.debounce_window_secs.is_finite() || self.debounce_window_secs <= 0.0 {
            return Err(ConfigError::Invalid(
                "debounce_window_secs must be positive".to_string(),
            ));
        }
        if self.seek_clamp_margin_secs < 0.0 {
            return Err(ConfigError::Invalid(
                "seek_clamp_margin_secs must not be negative".to_string(),
            ));
        }
        if self.timeline_poll_ms == 0 {
            return Err(ConfigError::Invalid("timeline_poll_ms must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Resume grace delay
    pub fn resume_grace(&self) -> Duration {
        Duration::from_millis(self.resume_grace_ms)
    }

    /// Timeline poll period
    pub fn timeline_poll(&self) -> Duration {
        Duration::from_millis(self.timeline_poll_ms)
    }
}
