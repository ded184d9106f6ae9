//! Status and output events, and the sinks that consume them.
//!
//! The pipeline never renders anything itself. It emits [`PipelineEvent`]s
//! to an [`EventSink`]; a terminal renderer, a log collector and a test
//! recorder are all just sinks.
//!
//! Sinks are called from the driver and from both output drain threads
//! of a running command, so every implementation serializes its writes.

mod error_log;
mod reporter;

pub use error_log::ErrorLog;
pub use reporter::Reporter;

use crate::pipeline::ImageOutcome;
use crate::status::StepStatus;
use parking_lot::Mutex;
use std::sync::Arc;

/// Everything the core tells the outside world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Processing of an image begins.
    ImageStarted { image: String },
    StepStatusChanged {
        image: String,
        step_index: usize,
        step: String,
        status: StepStatus,
    },
    /// A command is about to run; `display` is what an operator would type.
    CommandStarted {
        image: String,
        step: String,
        display: String,
    },
    /// Free-text output: acquisition notes or one line of command output.
    Output { image: String, text: String },
    Progress {
        image: String,
        done: u64,
        total: Option<u64>,
    },
    ImageFinished {
        image: String,
        outcome: ImageOutcome,
    },
    /// All images processed; names of the ones that failed, in order.
    RunFinished { failed: Vec<String> },
}

impl PipelineEvent {
    /// Image the event belongs to, if any.
    pub fn image(&self) -> Option<&str> {
        match self {
            PipelineEvent::ImageStarted { image }
            | PipelineEvent::StepStatusChanged { image, .. }
            | PipelineEvent::CommandStarted { image, .. }
            | PipelineEvent::Output { image, .. }
            | PipelineEvent::Progress { image, .. }
            | PipelineEvent::ImageFinished { image, .. } => Some(image),
            PipelineEvent::RunFinished { .. } => None,
        }
    }
}

/// Thread-safe consumer of pipeline events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

pub type SharedSink = Arc<dyn EventSink>;

/// Single-threaded event consumer, e.g. UI state that must not be
/// mutated concurrently. Wrap it in [`Serialized`] to share it.
pub trait EventHandler: Send {
    fn handle(&mut self, event: PipelineEvent);
}

/// Gives an [`EventHandler`] a single-writer-at-a-time write path.
pub struct Serialized<H> {
    inner: Mutex<H>,
}

impl<H: EventHandler> Serialized<H> {
    pub fn new(handler: H) -> Self {
        Self {
            inner: Mutex::new(handler),
        }
    }

    /// Run `f` against the handler while holding the write lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn into_inner(self) -> H {
        self.inner.into_inner()
    }
}

impl<H: EventHandler> EventSink for Serialized<H> {
    fn emit(&self, event: PipelineEvent) {
        self.inner.lock().handle(event);
    }
}

/// Records every event in memory.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().clone()
    }

    /// Status transitions of one image, in emission order.
    pub fn transitions(&self, image: &str) -> Vec<(usize, StepStatus)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                PipelineEvent::StepStatusChanged {
                    image: i,
                    step_index,
                    status,
                    ..
                } if i == image => Some((*step_index, *status)),
                _ => None,
            })
            .collect()
    }

    /// Output lines of one image, in emission order.
    pub fn output(&self, image: &str) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                PipelineEvent::Output { image: i, text } if i == image => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: PipelineEvent) {
        self.events.lock().push(event);
    }
}

/// Forwards every event to each inner sink in turn.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<SharedSink>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<SharedSink>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: SharedSink) {
        self.sinks.push(sink);
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: PipelineEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(event.clone());
            }
            last.emit(event);
        }
    }
}

/// Writes events as `tracing` records (target `ctgen::events`).
#[derive(Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::ImageStarted { image } => {
                tracing::info!(target: "ctgen::events", image = %image, "Image started");
            }
            PipelineEvent::StepStatusChanged {
                image,
                step_index,
                step,
                status,
            } => {
                tracing::info!(
                    target: "ctgen::events",
                    image = %image,
                    step_index,
                    step = %step,
                    status = %status,
                    "Step status changed"
                );
            }
            PipelineEvent::CommandStarted {
                image,
                step,
                display: shown,
            } => {
                tracing::info!(target: "ctgen::events", image = %image, step = %step, "$ {}", shown);
            }
            PipelineEvent::Output { image, text } => {
                tracing::debug!(target: "ctgen::events", image = %image, "{}", text);
            }
            PipelineEvent::Progress { image, done, total } => {
                tracing::trace!(target: "ctgen::events", image = %image, done, ?total, "Progress");
            }
            PipelineEvent::ImageFinished { image, outcome } => {
                tracing::info!(target: "ctgen::events", image = %image, outcome = %outcome, "Image finished");
            }
            PipelineEvent::RunFinished { failed } => {
                tracing::info!(target: "ctgen::events", failed = ?failed, "Run finished");
            }
        }
    }
}
