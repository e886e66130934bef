//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Every field carries a serde default so a partial config file is valid.

use serde::{Deserialize, Serialize};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Job log configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Pipeline tuning.
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// Path configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Default working root when the CLI does not override it.
    #[serde(default = "default_work_root")]
    pub work_root: String,

    /// Directory holding the stage executables. Empty means resolve each
    /// stage on $PATH.
    #[serde(default)]
    pub stage_dir: String,
}

fn default_work_root() -> String {
    "diar_work".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            work_root: default_work_root(),
            stage_dir: String::new(),
        }
    }
}

/// Job log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Number of stage output lines replayed after a failure.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Prefix log lines with a wall-clock timestamp.
    #[serde(default = "default_true")]
    pub show_timestamps: bool,
}

fn default_error_tail() -> u32 {
    20
}

fn default_true() -> bool {
    true
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            error_tail: default_error_tail(),
            show_timestamps: true,
        }
    }
}

/// Pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Fixed segment duration handed to the splitter, in seconds.
    #[serde(default = "default_segment_duration")]
    pub segment_duration_secs: u32,

    /// Scheduler poll interval while at capacity, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Default concurrency limit when the CLI does not override it.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Run the change-point segmentation stage by default.
    #[serde(default)]
    pub use_changepoint: bool,
}

fn default_segment_duration() -> u32 {
    600
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_concurrency() -> u32 {
    4
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            segment_duration_secs: default_segment_duration(),
            poll_interval_ms: default_poll_interval_ms(),
            concurrency: default_concurrency(),
            use_changepoint: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let s = Settings::default();
        assert_eq!(s.pipeline.segment_duration_secs, 600);
        assert_eq!(s.pipeline.poll_interval_ms, 2000);
        assert!(s.pipeline.concurrency >= 1);
        assert!(!s.pipeline.use_changepoint);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let s: Settings = toml::from_str("[pipeline]\nconcurrency = 8\n").unwrap();
        assert_eq!(s.pipeline.concurrency, 8);
        assert_eq!(s.pipeline.segment_duration_secs, 600);
        assert_eq!(s.paths.work_root, "diar_work");
    }

    #[test]
    fn round_trips_through_toml() {
        let s = Settings::default();
        let text = toml::to_string_pretty(&s).unwrap();
        let back: Settings = toml::from_str(&text).unwrap();
        assert_eq!(back.pipeline.poll_interval_ms, s.pipeline.poll_interval_ms);
        assert_eq!(back.paths.work_root, s.paths.work_root);
    }
}
