//! Step status and its state machine.
//!
//! Defines the possible states of a pipeline step and the valid
//! transitions between them.

use crate::errors::{CtgenError, CtgenResult};
use serde::{Deserialize, Serialize};

/// Status of one declared step of one image.
///
/// State machine:
/// ```text
/// Pending ──→ Running ──→ Success
///    │            └─────→ Failed
///    └──────→ Skipped      (an earlier step of the same image failed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl StepStatus {
    /// Success, Failed and Skipped never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Success | StepStatus::Failed | StepStatus::Skipped
        )
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, StepStatus::Pending)
    }

    /// Check if transition to target state is valid.
    pub fn can_transition_to(&self, target: StepStatus) -> bool {
        use StepStatus::*;
        matches!(
            (self, target),
            (Pending, Running) | (Pending, Skipped) | (Running, Success) | (Running, Failed)
        )
    }

    /// Validate and return the target status.
    pub fn transition_to(&self, target: StepStatus) -> CtgenResult<StepStatus> {
        if !self.can_transition_to(target) {
            return Err(CtgenError::InvalidState(format!(
                "Cannot transition step from {} to {}",
                self, target
            )));
        }
        Ok(target)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }
}

impl std::str::FromStr for StepStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StepStatus::Pending),
            "running" => Ok(StepStatus::Running),
            "success" => Ok(StepStatus::Success),
            "failed" => Ok(StepStatus::Failed),
            "skipped" => Ok(StepStatus::Skipped),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
