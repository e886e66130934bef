//! Audio property probing via the prober stage.
//!
//! The prober is the one collaborator that reports on stdout rather than
//! through files: two whitespace-separated tokens, duration in seconds and
//! sample rate in Hz.

use std::path::Path;
use std::process::Command;

use crate::models::AudioProperties;

use super::registry::{StageId, StageRegistry};
use super::{StageError, StageResult};

/// Probe a recording for duration and sample rate.
pub fn probe_recording(registry: &StageRegistry, recording: &Path) -> StageResult<AudioProperties> {
    if !recording.exists() {
        return Err(StageError::io(
            format!("probing {}", recording.display()),
            std::io::Error::new(std::io::ErrorKind::NotFound, "recording not found"),
        ));
    }

    let program = registry.resolve(StageId::Probe)?;

    tracing::debug!("Probing recording {}", recording.display());

    let output = Command::new(&program)
        .arg(recording)
        .output()
        .map_err(|e| StageError::Spawn {
            stage: StageId::Probe.label().to_string(),
            source: e,
        })?;

    if !output.status.success() {
        return Err(StageError::StageFailed {
            stage: StageId::Probe.label().to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        });
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parse prober stdout: `<duration_secs> <sample_rate>`.
fn parse_probe_output(stdout: &str) -> StageResult<AudioProperties> {
    let parse_err = |message: String| StageError::ParseOutput {
        stage: StageId::Probe.label().to_string(),
        message,
    };

    let mut tokens = stdout.split_whitespace();
    let duration_secs: f64 = tokens
        .next()
        .ok_or_else(|| parse_err("missing duration token".to_string()))?
        .parse()
        .map_err(|e| parse_err(format!("bad duration: {e}")))?;
    let sample_rate: u32 = tokens
        .next()
        .ok_or_else(|| parse_err("missing sample rate token".to_string()))?
        .parse()
        .map_err(|e| parse_err(format!("bad sample rate: {e}")))?;

    if duration_secs <= 0.0 {
        return Err(parse_err(format!("non-positive duration {duration_secs}")));
    }

    Ok(AudioProperties {
        duration_secs,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_and_rate() {
        let props = parse_probe_output("1500.00 16000\n").unwrap();
        assert!((props.duration_secs - 1500.0).abs() < f64::EPSILON);
        assert_eq!(props.sample_rate, 16000);
    }

    #[test]
    fn tolerates_trailing_tokens() {
        let props = parse_probe_output("90.5 44100 pcm_s16le\n").unwrap();
        assert_eq!(props.sample_rate, 44100);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_probe_output("").is_err());
        assert!(parse_probe_output("abc 16000").is_err());
        assert!(parse_probe_output("120.0").is_err());
        assert!(parse_probe_output("-5 16000").is_err());
    }
}
