pub mod settings;

pub use settings::{Config, ConfigError, EngineConfig, PublisherConfig, CaptureConfig};
