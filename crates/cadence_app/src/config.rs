//! Application configuration (cadence.toml)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub scene: SceneConfig,
}

/// Frame pacing
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TimingConfig {
    /// Logical frames per second
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Fewest frames run by a tick that has any frame due
    #[serde(default = "default_min_frames")]
    pub min_frames: u32,
    /// Most frames run by one tick; any further backlog is dropped
    #[serde(default = "default_max_frames")]
    pub max_frames: u32,
}

fn default_fps() -> u32 {
    60
}

fn default_min_frames() -> u32 {
    1
}

fn default_max_frames() -> u32 {
    4
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            min_frames: default_min_frames(),
            max_frames: default_max_frames(),
        }
    }
}

/// Scene lifecycle
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct SceneConfig {
    /// Force running tweens to their final frame when a node is disposed
    #[serde(default)]
    pub flush_tweens_on_dispose: bool,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        tracing::debug!(path = %path.display(), "loaded app config");
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content).context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    fn validate(&self) -> Result<()> {
        let timing = &self.timing;
        if timing.fps == 0 {
            anyhow::bail!("timing.fps must be greater than zero");
        }
        if timing.max_frames == 0 {
            anyhow::bail!("timing.max_frames must be at least 1");
        }
        if timing.min_frames > timing.max_frames {
            anyhow::bail!(
                "timing.min_frames ({}) exceeds timing.max_frames ({})",
                timing.min_frames,
                timing.max_frames
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.timing.fps, 60);
        assert_eq!(config.timing.min_frames, 1);
        assert_eq!(config.timing.max_frames, 4);
        assert!(!config.scene.flush_tweens_on_dispose);
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml_str(
            r#"
            [timing]
            fps = 30

            [scene]
            flush_tweens_on_dispose = true
            "#,
        )
        .unwrap();
        assert_eq!(config.timing.fps, 30);
        assert_eq!(config.timing.max_frames, 4);
        assert!(config.scene.flush_tweens_on_dispose);
    }

    #[test]
    fn test_rejects_invalid_timing() {
        assert!(AppConfig::from_toml_str("[timing]\nfps = 0").is_err());
        assert!(AppConfig::from_toml_str("[timing]\nmin_frames = 5\nmax_frames = 2").is_err());
        assert!(AppConfig::from_toml_str("[timing]\nfps = \"fast\"").is_err());
    }

    #[test]
    fn test_to_toml_reloads() {
        let mut config = AppConfig::default();
        config.timing.fps = 24;
        let text = config.to_toml().unwrap();
        assert_eq!(AppConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_from_path() {
        let path = std::env::temp_dir().join(format!("cadence-config-{}.toml", std::process::id()));
        fs::write(&path, "[timing]\nmax_frames = 8\n").unwrap();
        let loaded = AppConfig::load_from_path(&path);
        fs::remove_file(&path).unwrap();
        assert_eq!(loaded.unwrap().timing.max_frames, 8);

        let missing = AppConfig::load_from_path(Path::new("/nonexistent/cadence.toml"));
        assert!(missing.is_err());
    }
}
