//! Per-image step status board.

use crate::config::StepSpec;
use crate::constants::static_steps;
use crate::errors::{CtgenError, CtgenResult};
use crate::sink::Reporter;
use crate::status::StepStatus;

/// One [`StepStatus`] per visible step of one image.
///
/// Index 0 is `Download/Verify`, index 1 is `Copy Image`, declared steps
/// follow. Every change is validated and then emitted through the reporter.
pub struct StepBoard {
    names: Vec<String>,
    statuses: Vec<StepStatus>,
    reporter: Reporter,
}

impl StepBoard {
    /// Offset of the first declared step.
    pub const DECLARED_OFFSET: usize = static_steps::ALL.len();
    pub const DOWNLOAD: usize = 0;
    pub const COPY: usize = 1;

    pub fn new(steps: &[StepSpec], reporter: Reporter) -> Self {
        let names: Vec<String> = static_steps::ALL
            .iter()
            .map(|name| name.to_string())
            .chain(steps.iter().map(|step| step.name.clone()))
            .collect();
        let statuses = vec![StepStatus::Pending; names.len()];

        Self {
            names,
            statuses,
            reporter,
        }
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn status(&self, index: usize) -> Option<StepStatus> {
        self.statuses.get(index).copied()
    }

    pub fn statuses(&self) -> &[StepStatus] {
        &self.statuses
    }

    /// Move step `index` to `status`, emitting the change.
    pub fn advance(&mut self, index: usize, status: StepStatus) -> CtgenResult<()> {
        let current = self.statuses.get(index).copied().ok_or_else(|| {
            CtgenError::InvalidState(format!(
                "step index {} out of range for {} steps",
                index,
                self.statuses.len()
            ))
        })?;

        self.statuses[index] = current.transition_to(status)?;
        self.reporter.status(index, &self.names[index], status);
        Ok(())
    }

    /// Flip every still-pending step to skipped.
    pub fn mark_remaining_skipped(&mut self) {
        for index in 0..self.statuses.len() {
            if self.statuses[index].is_pending() {
                self.statuses[index] = StepStatus::Skipped;
                self.reporter
                    .status(index, &self.names[index], StepStatus::Skipped);
            }
        }
    }

    /// True once no step is pending or running.
    pub fn is_settled(&self) -> bool {
        self.statuses.iter().all(StepStatus::is_terminal)
    }
}
