//! Transfer progress display.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress for a byte transfer.
///
/// Shows a bar when the total size is known and a spinner with the byte
/// count otherwise.
pub struct TransferProgress {
    bar: ProgressBar,
}

impl TransferProgress {
    /// Create a visible progress display.
    pub fn new(label: &str, total: Option<u64>) -> Self {
        let bar = match total {
            Some(len) => {
                let bar = ProgressBar::new(len);
                bar.set_style(
                    ProgressStyle::with_template(
                        "  {msg} [{bar:30.magenta/dim}] {bytes}/{total_bytes} ({eta})",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::with_template("  {spinner:.magenta} {msg} {bytes}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar.enable_steady_tick(Duration::from_millis(80));
                bar
            }
        };
        bar.set_message(label.to_string());
        Self { bar }
    }

    /// A display that draws nothing.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Record `n` more bytes.
    pub fn advance(&self, n: u64) {
        self.bar.inc(n);
    }

    /// Bytes recorded so far.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Clear the display after a successful transfer.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    /// Leave the display as-is after a failed transfer.
    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

/// Format a duration for display.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", d.as_millis())
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// Format a byte count with a binary unit.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
