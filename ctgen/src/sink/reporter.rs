//! Per-image handle for emitting events.

use super::{PipelineEvent, SharedSink};
use crate::status::StepStatus;
use std::sync::Arc;

/// Binds a sink to one image so stages don't thread the image name around.
///
/// Cheap to clone; output drain threads each hold one.
#[derive(Clone)]
pub struct Reporter {
    sink: SharedSink,
    image: Arc<str>,
}

impl Reporter {
    pub fn new(sink: SharedSink, image: &str) -> Self {
        Self {
            sink,
            image: Arc::from(image),
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn output(&self, text: impl Into<String>) {
        self.sink.emit(PipelineEvent::Output {
            image: self.image.to_string(),
            text: text.into(),
        });
    }

    pub fn progress(&self, done: u64, total: Option<u64>) {
        self.sink.emit(PipelineEvent::Progress {
            image: self.image.to_string(),
            done,
            total,
        });
    }

    pub fn command(&self, step: &str, display: impl Into<String>) {
        self.sink.emit(PipelineEvent::CommandStarted {
            image: self.image.to_string(),
            step: step.to_string(),
            display: display.into(),
        });
    }

    pub fn status(&self, step_index: usize, step: &str, status: StepStatus) {
        self.sink.emit(PipelineEvent::StepStatusChanged {
            image: self.image.to_string(),
            step_index,
            step: step.to_string(),
            status,
        });
    }

    pub fn emit(&self, event: PipelineEvent) {
        self.sink.emit(event);
    }
}
