//! Line-oriented terminal rendering of pipeline events.

use std::collections::HashMap;
use std::io::Write;

use ctgen::fetch::format_progress;
use ctgen::sink::{EventHandler, PipelineEvent};
use ctgen::{ImageOutcome, StepStatus};

pub fn status_icon(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "❔",
        StepStatus::Running => "⚙️",
        StepStatus::Success => "✅",
        StepStatus::Failed => "❌",
        StepStatus::Skipped => "➖",
    }
}

/// Renders events as indented lines. Not thread-safe on its own; wrap it
/// in [`ctgen::sink::Serialized`].
pub struct ConsoleSink<W: Write + Send> {
    out: W,
    /// Last progress bucket printed per image.
    progress: HashMap<String, u64>,
}

impl ConsoleSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    /// Unknown-length downloads print once per this many bytes.
    const UNKNOWN_LENGTH_STEP: u64 = 100 * 1024 * 1024;

    pub fn new(out: W) -> Self {
        Self {
            out,
            progress: HashMap::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Returns the line to print when the progress bucket changed.
    fn progress_line(&mut self, image: &str, done: u64, total: Option<u64>) -> Option<String> {
        let bucket = match total {
            Some(total) if total > 0 => done.saturating_mul(10) / total,
            _ => done / Self::UNKNOWN_LENGTH_STEP,
        };
        let finished = total == Some(done);

        let previous = self.progress.insert(image.to_string(), bucket);
        if previous == Some(bucket) && !finished {
            return None;
        }
        Some(format_progress(done, total))
    }

    fn render(&mut self, event: PipelineEvent) -> std::io::Result<()> {
        match event {
            PipelineEvent::ImageStarted { image } => {
                self.progress.remove(&image);
                writeln!(self.out, "\n▶ {}", image)
            }
            PipelineEvent::StepStatusChanged { step, status, .. } => {
                writeln!(self.out, "  {} {}", status_icon(status), step)
            }
            PipelineEvent::CommandStarted { display, .. } => {
                writeln!(self.out, "    $ {}", display)
            }
            PipelineEvent::Output { text, .. } => writeln!(self.out, "    {}", text),
            PipelineEvent::Progress { image, done, total } => {
                match self.progress_line(&image, done, total) {
                    Some(line) => writeln!(self.out, "    {}", line),
                    None => Ok(()),
                }
            }
            PipelineEvent::ImageFinished { image, outcome } => {
                let icon = match outcome {
                    ImageOutcome::Success => "✅",
                    ImageOutcome::Failed => "❌",
                };
                writeln!(self.out, "{} {}", icon, image)
            }
            PipelineEvent::RunFinished { .. } => Ok(()),
        }?;
        self.out.flush()
    }
}

impl<W: Write + Send> EventHandler for ConsoleSink<W> {
    fn handle(&mut self, event: PipelineEvent) {
        if let Err(e) = self.render(event) {
            tracing::debug!("Console write failed: {}", e);
        }
    }
}
