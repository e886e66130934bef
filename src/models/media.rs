//! The recording, its segments, and probed audio properties.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Derive the base name (file stem) used to namespace every artifact
/// belonging to a recording or segment.
pub fn base_name_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "recording".to_string())
}

/// Audio properties reported by the prober stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioProperties {
    /// Total duration in seconds.
    pub duration_secs: f64,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

/// The input recording. Immutable for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    /// Path to the source audio file.
    pub path: PathBuf,
    /// Base name deriving all run-level artifact names.
    pub base_name: String,
    /// Total duration in seconds (from the prober).
    pub duration_secs: f64,
    /// Sample rate in Hz (from the prober).
    pub sample_rate: u32,
}

impl Recording {
    /// Create a recording from its path and probed properties.
    pub fn new(path: impl Into<PathBuf>, props: AudioProperties) -> Self {
        let path = path.into();
        let base_name = base_name_of(&path);
        Self {
            path,
            base_name,
            duration_secs: props.duration_secs,
            sample_rate: props.sample_rate,
        }
    }
}

/// One fixed-duration slice of the recording, materialized as its own
/// audio file by the splitter. Consumed by exactly one job; the base name
/// namespaces every path that job writes, so no two jobs ever share a path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Path to the segment audio file.
    pub path: PathBuf,
    /// Base name (file stem), e.g. `meeting_003`.
    pub base_name: String,
    /// Zero-based position in split order.
    pub index: usize,
}

impl Segment {
    /// Create a segment from its materialized file path.
    pub fn new(path: impl Into<PathBuf>, index: usize) -> Self {
        let path = path.into();
        let base_name = base_name_of(&path);
        Self {
            path,
            base_name,
            index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_strips_extension() {
        assert_eq!(base_name_of(Path::new("/tmp/meeting.wav")), "meeting");
        assert_eq!(base_name_of(Path::new("rec_001.wav")), "rec_001");
    }

    #[test]
    fn recording_derives_base_name() {
        let rec = Recording::new(
            "/data/standup.wav",
            AudioProperties {
                duration_secs: 1500.0,
                sample_rate: 16000,
            },
        );
        assert_eq!(rec.base_name, "standup");
        assert_eq!(rec.sample_rate, 16000);
    }

    #[test]
    fn segment_keeps_split_order() {
        let seg = Segment::new("/work/blind_segmentation/standup_002.wav", 1);
        assert_eq!(seg.base_name, "standup_002");
        assert_eq!(seg.index, 1);
    }
}
