use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("history capacity must be greater than zero")]
    InvalidCapacity,

    #[error("window length must be a positive number of seconds, got {0}")]
    InvalidWindow(f64),

    #[error("publish period must be greater than zero")]
    InvalidPeriod,

    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub publisher: PublisherConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub history_capacity: usize,
    pub window_secs: f64,
    pub top_talkers: usize,
    pub recent_sample: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub period_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub interface: Option<String>,
    pub snaplen: i32,
    pub timeout_ms: i32,
    pub promiscuous: bool,
    /// BPF expression applied to the capture handle, e.g. `tcp` or `port 80`.
    pub filter: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: 2000,
            window_secs: 10.0,
            top_talkers: 5,
            recent_sample: 10,
        }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self { period_ms: 1000 }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: None,
            snaplen: 65535,
            timeout_ms: 1000,
            promiscuous: false,
            filter: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        if !(self.window_secs.is_finite() && self.window_secs > 0.0) {
            return Err(ConfigError::InvalidWindow(self.window_secs));
        }
        Ok(())
    }
}

impl PublisherConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ms == 0 {
            return Err(ConfigError::InvalidPeriod);
        }
        Ok(())
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.publisher.validate()?;
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.history_capacity, 2000);
        assert_eq!(config.engine.window_secs, 10.0);
        assert_eq!(config.engine.top_talkers, 5);
        assert_eq!(config.engine.recent_sample, 10);
        assert_eq!(config.publisher.period(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let config = Config::from_toml_str(
            "[engine]\nhistory_capacity = 500\n\n[capture]\ninterface = \"eth0\"\n",
        )
        .unwrap();
        assert_eq!(config.engine.history_capacity, 500);
        assert_eq!(config.engine.window_secs, 10.0);
        assert_eq!(config.capture.interface.as_deref(), Some("eth0"));
        assert_eq!(config.publisher.period_ms, 1000);
    }

    #[test]
    fn test_rejects_non_positive_values() {
        assert!(matches!(
            Config::from_toml_str("[engine]\nhistory_capacity = 0\n"),
            Err(ConfigError::InvalidCapacity)
        ));
        assert!(matches!(
            Config::from_toml_str("[engine]\nwindow_secs = 0.0\n"),
            Err(ConfigError::InvalidWindow(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[engine]\nwindow_secs = -3.5\n"),
            Err(ConfigError::InvalidWindow(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[publisher]\nperiod_ms = 0\n"),
            Err(ConfigError::InvalidPeriod)
        ));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        assert!(matches!(
            Config::from_toml_str("[engine\nhistory_capacity = "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_capture_filter_round_trip() {
        let config = Config::from_toml_str("[capture]\nfilter = \"udp or port 80\"\n").unwrap();
        assert_eq!(config.capture.filter.as_deref(), Some("udp or port 80"));
        assert!(Config::default().capture.filter.is_none());

        let path = std::env::temp_dir().join(format!("packet-telemetry-filter-{}.toml", std::process::id()));
        config.save_to_file(&path).unwrap();
        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.capture.filter.as_deref(), Some("udp or port 80"));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir().join(format!("packet-telemetry-{}.toml", std::process::id()));
        let mut config = Config::default();
        config.engine.top_talkers = 3;
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.engine.top_talkers, 3);
        let _ = fs::remove_file(&path);
    }
}
