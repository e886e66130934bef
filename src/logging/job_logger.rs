//! Per-job logger writing to a dedicated file.
//!
//! The log file is opened in append mode: every stage of a job shares the
//! same log, and a later stage must never truncate what an earlier stage
//! wrote. A bounded tail buffer of recent stage output lines is kept so a
//! failure can be diagnosed without re-reading the whole file.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogConfig, LogLevel, MessagePrefix};

/// Per-job logger with append-only file output.
pub struct JobLogger {
    /// Job name for identification.
    job_name: String,
    /// Path to the log file.
    log_path: PathBuf,
    /// Buffered file writer.
    file_writer: Mutex<Option<BufWriter<File>>>,
    /// Logging configuration.
    config: LogConfig,
    /// Recent stage output lines for failure diagnosis.
    tail_buffer: Mutex<VecDeque<String>>,
}

impl JobLogger {
    /// Create a logger for one job.
    ///
    /// The log file is `<log_dir>/<job_name>.log`, created if missing and
    /// appended to if present.
    pub fn new(
        job_name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
    ) -> std::io::Result<Self> {
        let job_name = job_name.into();
        let log_dir = log_dir.as_ref();

        std::fs::create_dir_all(log_dir)?;
        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&job_name)));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            job_name,
            log_path,
            file_writer: Mutex::new(Some(BufWriter::new(file))),
            config,
            tail_buffer: Mutex::new(VecDeque::with_capacity(64)),
        })
    }

    /// Get the job name.
    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Get the log file path.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }
        let formatted = self.format_message(message);
        self.output(&formatted);
    }

    /// Log an info message.
    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Log a debug message.
    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    /// Log a warning message.
    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    /// Log an error message.
    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    /// Log a stage invocation.
    pub fn command(&self, command: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Command.format(command));
    }

    /// Log a phase marker.
    pub fn phase(&self, phase_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Phase.format(phase_name));
    }

    /// Log a section marker.
    pub fn section(&self, section_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Section.format(section_name));
    }

    /// Log a success message.
    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    /// Append a line of stage stdout/stderr to the log and the tail buffer.
    pub fn output_line(&self, line: &str, is_stderr: bool) {
        {
            let mut buffer = self.tail_buffer.lock();
            if buffer.len() >= self.config.error_tail {
                buffer.pop_front();
            }
            buffer.push_back(line.to_string());
        }

        let prefix = if is_stderr { "[stderr] " } else { "" };
        self.output(&self.format_message(&format!("{}{}", prefix, line)));
    }

    /// Write the tail buffer back out under a header, typically after a
    /// stage failure.
    pub fn show_tail(&self, header: &str) {
        let buffer = self.tail_buffer.lock();
        if buffer.is_empty() {
            return;
        }
        self.output(&self.format_message(&format!("[{}/tail]", header)));
        for line in buffer.iter() {
            self.output(&self.format_message(line));
        }
    }

    /// Get the current tail buffer contents.
    pub fn get_tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    /// Flush the log file.
    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Close the logger and release the file handle.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    fn format_message(&self, message: &str) -> String {
        if self.config.show_timestamps {
            let timestamp = Local::now().format("%H:%M:%S");
            format!("[{}] {}", timestamp, message)
        } else {
            message.to_string()
        }
    }

    fn output(&self, formatted: &str) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writeln!(writer, "{}", formatted);
        }
    }
}

impl Drop for JobLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sanitize a string to be safe for use as a filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn creates_log_file() {
        let dir = tempdir().unwrap();
        let logger = JobLogger::new("seg_001", dir.path(), LogConfig::default()).unwrap();

        assert!(logger.log_path().exists());
        assert!(logger.log_path().to_string_lossy().contains("seg_001.log"));
    }

    #[test]
    fn writes_to_file() {
        let dir = tempdir().unwrap();
        let logger = JobLogger::new("seg_001", dir.path(), LogConfig::default()).unwrap();

        logger.info("Test message");
        logger.flush();

        let content = fs::read_to_string(logger.log_path()).unwrap();
        assert!(content.contains("Test message"));
    }

    #[test]
    fn reopening_appends_instead_of_truncating() {
        let dir = tempdir().unwrap();

        {
            let logger = JobLogger::new("seg_001", dir.path(), LogConfig::default()).unwrap();
            logger.info("first stage output");
        }
        {
            let logger = JobLogger::new("seg_001", dir.path(), LogConfig::default()).unwrap();
            logger.info("second stage output");
        }

        let path = dir.path().join("seg_001.log");
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("first stage output"));
        assert!(content.contains("second stage output"));
    }

    #[test]
    fn tail_buffer_maintains_limit() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            error_tail: 5,
            ..LogConfig::default()
        };
        let logger = JobLogger::new("seg_001", dir.path(), config).unwrap();

        for i in 0..10 {
            logger.output_line(&format!("Line {}", i), false);
        }

        let tail = logger.get_tail();
        assert_eq!(tail.len(), 5);
        assert_eq!(tail[0], "Line 5");
        assert_eq!(tail[4], "Line 9");
    }

    #[test]
    fn stderr_lines_are_marked() {
        let dir = tempdir().unwrap();
        let logger = JobLogger::new("seg_001", dir.path(), LogConfig::default()).unwrap();

        logger.output_line("boom", true);
        logger.flush();

        let content = fs::read_to_string(logger.log_path()).unwrap();
        assert!(content.contains("[stderr] boom"));
    }

    #[test]
    fn sanitizes_filename() {
        assert_eq!(sanitize_filename("normal_name"), "normal_name");
        assert_eq!(sanitize_filename("has/slash"), "has_slash");
        assert_eq!(sanitize_filename("a<b>c"), "a_b_c");
    }
}
