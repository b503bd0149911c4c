//! Main settings module

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from an optional TOML file, then layer
    /// `VOICECHAIN__`-prefixed environment variables on top
    /// (e.g. `VOICECHAIN__PIPELINE__SPEAK_MODE=full_response`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if !path.as_ref().exists() {
            tracing::warn!("Config file not found, using defaults: {}", path.as_ref().display());
        }

        let cfg = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("VOICECHAIN")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let settings: Settings = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.guard_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.guard_timeout_ms".to_string(),
                message: "Guard timeout must be non-zero".to_string(),
            });
        }

        if self.pipeline.queue_poll_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.queue_poll_ms".to_string(),
                message: "Queue poll interval must be non-zero".to_string(),
            });
        }

        if self.pipeline.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.channel_capacity".to_string(),
                message: "Hand-off channel capacity must be non-zero".to_string(),
            });
        }

        Ok(())
    }
}

/// How a turn's response is spoken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakMode {
    /// Synthesize and play sentence by sentence while the model is still
    /// generating (producer/consumer split, lowest latency)
    SentenceChain,
    /// Buffer the whole response, then synthesize and play it once
    FullResponse,
}

impl Default for SpeakMode {
    fn default() -> Self {
        SpeakMode::SentenceChain
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Speak mode
    #[serde(default)]
    pub speak_mode: SpeakMode,

    /// Pre-turn guard: how long to wait for a previous cancellation's
    /// cleanup to reset the token before failing the turn
    #[serde(default = "default_guard_timeout_ms")]
    pub guard_timeout_ms: u64,

    /// Playback's poll interval on the hand-off channel, which bounds how
    /// long cancellation can go unobserved while waiting for the next unit
    #[serde(default = "default_queue_poll_ms")]
    pub queue_poll_ms: u64,

    /// Hand-off channel capacity; bounds how far synthesis can run ahead
    /// of playback
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Log timing telemetry per turn
    #[serde(default)]
    pub show_timing: bool,

    /// Verbose per-sentence logging
    #[serde(default)]
    pub verbose: bool,
}

fn default_guard_timeout_ms() -> u64 {
    5000
}
fn default_queue_poll_ms() -> u64 {
    100
}
fn default_channel_capacity() -> usize {
    8
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            speak_mode: SpeakMode::default(),
            guard_timeout_ms: default_guard_timeout_ms(),
            queue_poll_ms: default_queue_poll_ms(),
            channel_capacity: default_channel_capacity(),
            show_timing: false,
            verbose: false,
        }
    }
}
