//! CLI settings: the engine configuration plus the assistant section.

use crate::assistant::AssistantConfig;
use anyhow::Context;
use leveler_engine::{EngineConfig, default_config_path};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything read from the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Engine sections (`[audio]`, `[metering]`, ...).
    #[serde(flatten)]
    pub engine: EngineConfig,
    /// `[assistant]`.
    pub assistant: AssistantConfig,
}

impl Settings {
    /// Load `path`, or the user config file if present, or defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let path = default_config_path();
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let settings = Self::from_toml(&content)
            .with_context(|| format!("loading {}", path.display()))?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Parse and validate TOML.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let settings: Self = toml::from_str(content)?;
        settings.engine.validate()?;
        Ok(settings)
    }

    /// Pretty TOML.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_land_in_the_right_place() {
        let settings = Settings::from_toml(
            r#"
            [capture]
            max_seconds = 5

            [assistant]
            model = "other-model"
            timeout_secs = 3
            "#,
        )
        .unwrap();
        assert_eq!(settings.engine.capture.max_seconds, 5);
        assert_eq!(settings.assistant.model, "other-model");
        assert_eq!(settings.assistant.timeout_secs, 3);
        assert_eq!(settings.engine.audio.sample_rate, 48000);
    }

    #[test]
    fn engine_values_are_validated() {
        assert!(Settings::from_toml("[capture]\nmax_seconds = 0\n").is_err());
    }

    #[test]
    fn dump_reloads_to_the_same_settings() {
        let settings = Settings::default();
        let text = settings.to_toml().unwrap();
        assert!(text.contains("[assistant]"));
        assert!(text.contains("[dynamics]"));
        assert_eq!(Settings::from_toml(&text).unwrap(), settings);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
