//! Durable run log.
//!
//! Every command line, its captured output and each status message is
//! appended to a plain text file with a fixed prefix, and mirrored to
//! `tracing`. Failures to write the file are swallowed.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Prefix carried by every line in the run log.
pub const LOG_PREFIX: &str = "[setup]";

/// Append-only run log.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    path: Option<PathBuf>,
}

impl RunLog {
    /// Create a log appending to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A log that only emits through `tracing`.
    pub fn discard() -> Self {
        Self { path: None }
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a status message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{}", msg);
        self.append(msg);
    }

    /// Record a warning.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{}", msg);
        self.append(msg);
    }

    /// Record command lines and captured output.
    ///
    /// These are noisy, so they only reach the console at debug level.
    pub fn record(&self, msg: &str) {
        tracing::debug!("{}", msg);
        self.append(msg);
    }

    /// Write a separator marking the start of a run.
    pub fn start_session(&self) {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        self.append(&format!("==== run started {} ====", stamp));
    }

    fn append(&self, msg: &str) {
        let Some(path) = &self.path else {
            return;
        };

        let mut text = String::new();
        for line in msg.lines() {
            text.push_str(LOG_PREFIX);
            text.push(' ');
            text.push_str(line);
            text.push('\n');
        }
        if text.is_empty() {
            return;
        }

        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut f| f.write_all(text.as_bytes()));
        if let Err(e) = written {
            tracing::trace!(error = %e, "run log write failed");
        }
    }
}
