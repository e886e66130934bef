//! Settings and config file management.

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{LoggingSettings, PathSettings, PipelineSettings, Settings};
