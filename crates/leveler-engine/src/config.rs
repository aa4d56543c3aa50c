//! Engine configuration.
//!
//! Every field has a default, so an empty file (or no file at all) gives the
//! stock leveler. A full file looks like:
//!
//! ```toml
//! [audio]
//! sample_rate = 48000
//! block_size = 256
//! output_device = "USB"
//!
//! [metering]
//! refresh_hz = 60.0
//! tap_window = 128
//!
//! [capture]
//! max_seconds = 10
//!
//! [tone]
//! frequency_hz = 200.0
//! lfo_hz = 2.0
//! level = 0.6
//! depth = 0.3
//!
//! [dynamics]
//! ratio = 12.0
//! knee_db = 0.0
//! attack_ms = 5.0
//! release_ms = 250.0
//! release = "single_stage"
//! ```

use crate::error::ConfigError;
use leveler_effects::{DynamicsSettings, ToneSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "leveler";
const CONFIG_FILE: &str = "config.toml";

/// Audio device settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Processing sample rate in Hz.
    pub sample_rate: u32,
    /// Preferred device buffer size in frames.
    pub block_size: u32,
    /// Capture device name filter (system default if unset).
    pub input_device: Option<String>,
    /// Playback device name filter (system default if unset).
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 256,
            input_device: None,
            output_device: None,
        }
    }
}

/// Meter refresh settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeteringConfig {
    /// Meter ticks per second.
    pub refresh_hz: f32,
    /// Time-domain window read from the analysis tap, in samples.
    pub tap_window: usize,
}

/// Slowest meter refresh rate accepted.
pub const MIN_REFRESH_HZ: f32 = 0.1;
/// Fastest meter refresh rate accepted.
pub const MAX_REFRESH_HZ: f32 = 1000.0;
const DEFAULT_REFRESH_HZ: f32 = 60.0;

impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            refresh_hz: DEFAULT_REFRESH_HZ,
            tap_window: 128,
        }
    }
}

impl MeteringConfig {
    /// Time between meter ticks.
    ///
    /// A rate that is not a positive number falls back to the default; others
    /// are clamped to `MIN_REFRESH_HZ..=MAX_REFRESH_HZ`.
    pub fn interval(&self) -> Duration {
        let hz = if self.refresh_hz.is_finite() && self.refresh_hz > 0.0 {
            self.refresh_hz.clamp(MIN_REFRESH_HZ, MAX_REFRESH_HZ)
        } else {
            DEFAULT_REFRESH_HZ
        };
        Duration::from_secs_f32(1.0 / hz)
    }
}

/// Recording settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Longest recording in seconds.
    pub max_seconds: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { max_seconds: 10 }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Audio devices.
    pub audio: AudioConfig,
    /// Metering loop.
    pub metering: MeteringConfig,
    /// Capture state machine.
    pub capture: CaptureConfig,
    /// Test tone.
    pub tone: ToneSettings,
    /// Fixed dynamics characteristics.
    pub dynamics: DynamicsSettings,
}

impl EngineConfig {
    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load `path` if given, else the user config file if it exists, else
    /// defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::write_file(parent, e))?;
        }
        std::fs::write(path, self.to_toml()?).map_err(|e| ConfigError::write_file(path, e))
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(8000..=192_000).contains(&self.audio.sample_rate) {
            return Err(ConfigError::invalid(
                "audio.sample_rate",
                format!("{} is outside 8000..=192000", self.audio.sample_rate),
            ));
        }
        if self.audio.block_size == 0 {
            return Err(ConfigError::invalid("audio.block_size", "must be positive"));
        }
        let hz = self.metering.refresh_hz;
        if !(MIN_REFRESH_HZ..=MAX_REFRESH_HZ).contains(&hz) {
            return Err(ConfigError::invalid(
                "metering.refresh_hz",
                format!("{hz} is outside [{MIN_REFRESH_HZ}, {MAX_REFRESH_HZ}]"),
            ));
        }
        if self.metering.tap_window == 0 {
            return Err(ConfigError::invalid("metering.tap_window", "must be positive"));
        }
        if self.capture.max_seconds == 0 {
            return Err(ConfigError::invalid("capture.max_seconds", "must be positive"));
        }
        if self.dynamics.ratio.is_nan() || self.dynamics.ratio < 1.0 {
            return Err(ConfigError::invalid("dynamics.ratio", "must be at least 1"));
        }
        let d = &self.dynamics;
        if d.knee_db < 0.0 || d.attack_ms < 0.0 || d.release_ms < 0.0 {
            return Err(ConfigError::invalid(
                "dynamics",
                "knee, attack and release must not be negative",
            ));
        }
        let nyquist = self.audio.sample_rate as f32 / 2.0;
        if self.tone.frequency_hz <= 0.0 || self.tone.frequency_hz >= nyquist {
            return Err(ConfigError::invalid(
                "tone.frequency_hz",
                "must be between 0 and Nyquist",
            ));
        }
        Ok(())
    }
}

/// `<config dir>/leveler/config.toml`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join(CONFIG_FILE)
}
