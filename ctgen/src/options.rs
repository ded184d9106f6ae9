//! Options for a generator run.

use std::path::Path;
use std::time::Duration;

use crate::constants::timing;
use crate::layout::HostLayout;

/// Host layout plus the pause after each successful step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratorOptions {
    pub layout: HostLayout,
    /// Zero disables pacing.
    pub pacing: Duration,
}

impl GeneratorOptions {
    pub fn new(layout: HostLayout) -> Self {
        Self {
            layout,
            pacing: timing::STEP_PACING,
        }
    }

    /// Everything under `root`, no pacing. For tests and dry runs.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            layout: HostLayout::rooted_at(root),
            pacing: Duration::ZERO,
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self::new(HostLayout::default())
    }
}
