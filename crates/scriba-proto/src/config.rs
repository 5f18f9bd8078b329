use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

/// Where the backend process listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl BackendConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Playback session polling and its safety bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// How often to ask the backend whether audio is still playing.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Absolute bound on a session's lifetime if the backend never reports
    /// completion.  Firing this is a normal transition, not an error.
    #[serde(default = "default_safety_timeout_secs")]
    pub safety_timeout_secs: u64,
}

impl PlaybackConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn safety_timeout(&self) -> Duration {
        Duration::from_secs(self.safety_timeout_secs)
    }
}

/// Durations for per-row transient affordances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// How long the "copied" confirmation stays on a row.
    #[serde(default = "default_flash_ms")]
    pub copy_flash_ms: u64,
    /// How long a failed action is flagged on a row before the control is
    /// restored.
    #[serde(default = "default_flash_ms")]
    pub error_flash_ms: u64,
}

impl UiConfig {
    pub fn copy_flash(&self) -> Duration {
        Duration::from_millis(self.copy_flash_ms)
    }

    pub fn error_flash(&self) -> Duration {
        Duration::from_millis(self.error_flash_ms)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            safety_timeout_secs: default_safety_timeout_secs(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            copy_flash_ms: default_flash_ms(),
            error_flash_ms: default_flash_ms(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_safety_timeout_secs() -> u64 {
    600
}

fn default_flash_ms() -> u64 {
    2000
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend.host, "127.0.0.1");
        assert_eq!(config.backend.port, 8787);
        assert_eq!(config.playback.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.playback.safety_timeout(), Duration::from_secs(600));
        assert_eq!(config.ui.copy_flash(), Duration::from_millis(2000));
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str("[backend]\nport = 9000\n").unwrap();
        assert_eq!(config.backend.port, 9000);
        assert_eq!(config.backend.host, "127.0.0.1");
        assert_eq!(config.playback.poll_interval_ms, 500);
    }
}
