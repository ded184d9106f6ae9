//! Per-image results and the run-level summary.

use std::fmt;

/// Final verdict for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageOutcome {
    Success,
    Failed,
}

impl ImageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageOutcome::Success => "success",
            ImageOutcome::Failed => "failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ImageOutcome::Success)
    }
}

impl fmt::Display for ImageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one image's run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    pub image: String,
    pub outcome: ImageOutcome,
    pub duration_ms: u128,
}

/// Everything a run produced, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub results: Vec<PipelineResult>,
}

impl RunSummary {
    /// Names of failed images, in input order.
    pub fn failed_images(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.outcome.is_success())
            .map(|r| r.image.as_str())
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_success())
    }
}
