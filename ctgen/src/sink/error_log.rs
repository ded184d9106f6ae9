//! Per-image error log files.

use chrono::{Local, SecondsFormat};
use std::io::Write;
use std::path::PathBuf;

use crate::constants::filenames;

/// Appends `[<RFC3339>] <message>` lines to `<logs_dir>/<image>.error.log`.
///
/// Failing to write is never escalated; the line is dropped.
#[derive(Clone, Debug)]
pub struct ErrorLog {
    logs_dir: PathBuf,
}

impl ErrorLog {
    pub fn new(logs_dir: PathBuf) -> Self {
        Self { logs_dir }
    }

    pub fn path_for(&self, image: &str) -> PathBuf {
        self.logs_dir
            .join(format!("{}{}", image, filenames::ERROR_LOG_SUFFIX))
    }

    pub fn append(&self, image: &str, message: impl std::fmt::Display) {
        let path = self.path_for(image);
        let line = format!(
            "[{}] {}\n",
            Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            message
        );

        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| file.write_all(line.as_bytes()));

        if let Err(e) = result {
            tracing::debug!(file = %path.display(), "Dropped error log line: {}", e);
        }
    }
}
