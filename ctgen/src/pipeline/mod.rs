//! Per-image pipeline: acquisition, staging, provisioning.
//!
//! Images run strictly one after another in input order. They share the
//! staging file, so this module must never process two images at once.
//!
//! ```text
//! Queued → Acquiring → Staging → Provisioning → Done(success)
//!              │           │           └──────→ Done(failed)
//!              └───────────┴──────────────────→ Done(failed)
//! ```

mod board;
mod summary;

pub use board::StepBoard;
pub use summary::{ImageOutcome, PipelineResult, RunSummary};

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::acquire::Acquirer;
use crate::config::{ImageSpec, StepSpec};
use crate::constants::static_steps;
use crate::errors::{CtgenError, CtgenResult};
use crate::exec::{CommandExecutor, CommandSpec, ProcessExecutor};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::layout::HostLayout;
use crate::options::GeneratorOptions;
use crate::provision::Provisioner;
use crate::sink::{ErrorLog, PipelineEvent, Reporter, SharedSink};
use crate::status::StepStatus;

/// Where an image currently is in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePhase {
    Queued,
    Acquiring,
    Staging,
    Provisioning,
    Done(ImageOutcome),
}

impl ImagePhase {
    pub fn can_transition_to(&self, target: ImagePhase) -> bool {
        use ImagePhase::*;
        matches!(
            (self, target),
            (Queued, Acquiring)
                | (Acquiring, Staging)
                | (Acquiring, Done(ImageOutcome::Failed))
                | (Staging, Provisioning)
                | (Staging, Done(ImageOutcome::Failed))
                | (Provisioning, Done(_))
        )
    }
}

impl fmt::Display for ImagePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImagePhase::Queued => write!(f, "queued"),
            ImagePhase::Acquiring => write!(f, "acquiring"),
            ImagePhase::Staging => write!(f, "staging"),
            ImagePhase::Provisioning => write!(f, "provisioning"),
            ImagePhase::Done(outcome) => write!(f, "done({})", outcome),
        }
    }
}

/// Drives every image through the pipeline and reports to a sink.
pub struct PipelineDriver {
    layout: HostLayout,
    acquirer: Acquirer,
    provisioner: Provisioner,
    sink: SharedSink,
    error_log: ErrorLog,
    pacing: Duration,
}

impl PipelineDriver {
    pub fn new(
        options: GeneratorOptions,
        fetcher: Arc<dyn Fetcher>,
        executor: Arc<dyn CommandExecutor>,
        sink: SharedSink,
    ) -> Self {
        let GeneratorOptions { layout, pacing } = options;
        Self {
            acquirer: Acquirer::new(fetcher, layout.iso_dir.clone()),
            provisioner: Provisioner::new(executor, layout.clone(), pacing),
            error_log: layout.error_log(),
            layout,
            sink,
            pacing,
        }
    }

    /// Driver with an HTTP fetcher and real processes.
    pub fn with_defaults(options: GeneratorOptions, sink: SharedSink) -> Self {
        Self::new(
            options,
            Arc::new(HttpFetcher::new()),
            Arc::new(ProcessExecutor::new()),
            sink,
        )
    }

    pub fn layout(&self) -> &HostLayout {
        &self.layout
    }

    /// Process `images` in order. Per-image failures never stop the run.
    pub async fn run(&self, images: &[ImageSpec], steps: &[StepSpec]) -> RunSummary {
        let mut summary = RunSummary::default();

        for image in images {
            let start = Instant::now();
            let outcome = self.run_image(image, steps).await;
            summary.results.push(PipelineResult {
                image: image.name.clone(),
                outcome,
                duration_ms: start.elapsed().as_millis(),
            });
        }

        let failed: Vec<String> = summary
            .failed_images()
            .into_iter()
            .map(str::to_string)
            .collect();
        self.sink.emit(PipelineEvent::RunFinished { failed });

        summary
    }

    async fn run_image(&self, image: &ImageSpec, steps: &[StepSpec]) -> ImageOutcome {
        let reporter = Reporter::new(Arc::clone(&self.sink), &image.name);
        let mut board = StepBoard::new(steps, reporter.clone());
        let mut phase = ImagePhase::Queued;

        reporter.emit(PipelineEvent::ImageStarted {
            image: image.name.clone(),
        });
        tracing::info!(image = %image.name, steps = board.len(), "Processing image");

        let result = self
            .run_stages(image, steps, &reporter, &mut board, &mut phase)
            .await;

        let outcome = match result {
            Ok(()) => ImageOutcome::Success,
            Err(e) => {
                tracing::warn!(image = %image.name, phase = %phase, "Image failed: {}", e);
                self.error_log.append(&image.name, &e);
                board.mark_remaining_skipped();
                ImageOutcome::Failed
            }
        };
        enter(&mut phase, ImagePhase::Done(outcome), &image.name);

        reporter.emit(PipelineEvent::ImageFinished {
            image: image.name.clone(),
            outcome,
        });
        outcome
    }

    async fn run_stages(
        &self,
        image: &ImageSpec,
        steps: &[StepSpec],
        reporter: &Reporter,
        board: &mut StepBoard,
        phase: &mut ImagePhase,
    ) -> CtgenResult<()> {
        enter(phase, ImagePhase::Acquiring, &image.name);
        let cached = self
            .run_static_step(board, StepBoard::DOWNLOAD, || {
                self.acquirer.acquire(image, reporter)
            })
            .await?;

        enter(phase, ImagePhase::Staging, &image.name);
        let staging = self.layout.staging_file.clone();
        self.run_static_step(board, StepBoard::COPY, || {
            self.stage(&cached, &staging, reporter)
        })
        .await?;

        enter(phase, ImagePhase::Provisioning, &image.name);
        let mut on_status = |index: usize, status: StepStatus| {
            if let Err(e) = board.advance(StepBoard::DECLARED_OFFSET + index, status) {
                tracing::error!(image = %image.name, "Rejected step update: {}", e);
            }
        };
        self.provisioner
            .provision(image, &staging, steps, reporter, &mut on_status)
            .await
    }

    /// Run one built-in step with running/success/failed bookkeeping.
    async fn run_static_step<T, F, Fut>(
        &self,
        board: &mut StepBoard,
        index: usize,
        work: F,
    ) -> CtgenResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CtgenResult<T>>,
    {
        board.advance(index, StepStatus::Running)?;
        match work().await {
            Ok(value) => {
                board.advance(index, StepStatus::Success)?;
                self.pace().await;
                Ok(value)
            }
            Err(e) => {
                board.advance(index, StepStatus::Failed)?;
                Err(e)
            }
        }
    }

    /// Copy the cached image over the staging file.
    async fn stage(&self, cached: &Path, staging: &Path, reporter: &Reporter) -> CtgenResult<()> {
        let copy = CommandSpec::new(
            "cp",
            vec![
                cached.display().to_string(),
                staging.display().to_string(),
            ],
        );
        reporter.command(static_steps::COPY, copy.display());
        reporter.output(format!(
            "Copying {} to {}...",
            cached.display(),
            staging.display()
        ));

        tokio::fs::copy(cached, staging).await.map_err(|e| {
            CtgenError::Storage(format!(
                "copy {} to {} failed: {}",
                cached.display(),
                staging.display(),
                e
            ))
        })?;

        reporter.output("Copy complete.");
        Ok(())
    }

    async fn pace(&self) {
        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
    }
}

fn enter(phase: &mut ImagePhase, next: ImagePhase, image: &str) {
    if !phase.can_transition_to(next) {
        tracing::error!(image = %image, from = %phase, to = %next, "Unexpected phase change");
    }
    tracing::debug!(image = %image, from = %phase, to = %next, "Phase change");
    *phase = next;
}
