//! Rate limiting for download progress reports.

use std::time::{Duration, Instant};

/// Decides when a progress report is due.
///
/// Limits how often the UI is told about progress, never how fast bytes
/// are written.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last_report: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_report: None,
        }
    }

    /// Returns true (and records `now`) when at least `interval` has passed
    /// since the previous report. The first call always reports.
    pub fn should_report(&mut self, now: Instant) -> bool {
        let due = match self.last_report {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due {
            self.last_report = Some(now);
        }
        due
    }
}

/// Percentage string for a progress pair, or a byte count if the total is unknown.
pub fn format_progress(done: u64, total: Option<u64>) -> String {
    match total {
        Some(total) if total > 0 => {
            format!("Downloading: {:.2}%", done as f64 / total as f64 * 100.0)
        }
        _ => format!("Downloading: {} MiB", done / (1024 * 1024)),
    }
}
