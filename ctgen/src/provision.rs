//! Provisioning stage: run the declared steps against the staged disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ImageSpec, StepSpec};
use crate::constants::placeholders;
use crate::errors::{CtgenError, CtgenResult};
use crate::exec::{CommandExecutor, CommandSpec, LineCallback, OutputStream};
use crate::layout::HostLayout;
use crate::sink::{ErrorLog, Reporter};
use crate::status::StepStatus;

/// Values substituted into step command templates for one image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepContext {
    pub id: String,
    pub name: String,
    pub tags: String,
    pub vendor: String,
    pub file_path: String,
}

impl StepContext {
    pub fn new(image: &ImageSpec, file_path: &Path) -> Self {
        Self {
            id: image.id.to_string(),
            name: image.name.clone(),
            tags: image.tags.clone(),
            vendor: image.vendor.clone(),
            file_path: file_path.display().to_string(),
        }
    }

    /// Replace every placeholder in `template` in a single left-to-right
    /// pass. Substituted values are never rescanned.
    pub fn substitute(&self, template: &str) -> String {
        let table = [
            (placeholders::ID, self.id.as_str()),
            (placeholders::NAME, self.name.as_str()),
            (placeholders::TAGS, self.tags.as_str()),
            (placeholders::VENDOR, self.vendor.as_str()),
            (placeholders::FILE_PATH, self.file_path.as_str()),
        ];

        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(pos) = rest.find("{{.") {
            out.push_str(&rest[..pos]);
            rest = &rest[pos..];
            match table.iter().find(|(key, _)| rest.starts_with(key)) {
                Some((key, value)) => {
                    out.push_str(value);
                    rest = &rest[key.len()..];
                }
                None => {
                    out.push_str("{{.");
                    rest = &rest[3..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Runs declared steps through a [`CommandExecutor`].
pub struct Provisioner {
    executor: Arc<dyn CommandExecutor>,
    layout: HostLayout,
    pacing: Duration,
    error_log: ErrorLog,
}

impl Provisioner {
    pub fn new(executor: Arc<dyn CommandExecutor>, layout: HostLayout, pacing: Duration) -> Self {
        let error_log = layout.error_log();
        Self {
            executor,
            layout,
            pacing,
            error_log,
        }
    }

    /// Install the vendor snippet, run every step, then remove `staged`.
    ///
    /// `on_status` receives indices into `steps`. The staged file is
    /// removed whatever the outcome; failing to remove it is logged only.
    pub async fn provision(
        &self,
        image: &ImageSpec,
        staged: &Path,
        steps: &[StepSpec],
        reporter: &Reporter,
        on_status: &mut (dyn FnMut(usize, StepStatus) + Send),
    ) -> CtgenResult<()> {
        let result = match self.install_vendor_snippet(&image.vendor).await {
            Ok(_) => {
                let context = StepContext::new(image, staged);
                self.run_steps(image, steps, &context, reporter, on_status)
                    .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = tokio::fs::remove_file(staged).await {
            tracing::warn!(image = %image.name, file = %staged.display(), "Failed to remove staged file: {}", e);
            self.error_log.append(
                &image.name,
                format!("failed to remove {} file: {}", staged.display(), e),
            );
        }

        result
    }

    /// Copy `<cloudinit_dir>/<vendor>` over `<snippets_dir>/<vendor>`.
    pub async fn install_vendor_snippet(&self, vendor: &str) -> CtgenResult<PathBuf> {
        let source = self.layout.vendor_snippet_source(vendor);
        let target = self.layout.vendor_snippet_target(vendor);

        tokio::fs::copy(&source, &target).await.map_err(|e| {
            CtgenError::Storage(format!(
                "copying cloudinit config failed: {} -> {}: {}",
                source.display(),
                target.display(),
                e
            ))
        })?;

        tracing::debug!(vendor = %vendor, target = %target.display(), "Installed cloud-init snippet");
        Ok(target)
    }

    /// Execute `steps` in order. After the first failure the remaining
    /// steps are reported skipped and never executed.
    pub async fn run_steps(
        &self,
        image: &ImageSpec,
        steps: &[StepSpec],
        context: &StepContext,
        reporter: &Reporter,
        on_status: &mut (dyn FnMut(usize, StepStatus) + Send),
    ) -> CtgenResult<()> {
        let mut has_failed = false;

        for (index, step) in steps.iter().enumerate() {
            if has_failed {
                on_status(index, StepStatus::Skipped);
                continue;
            }

            on_status(index, StepStatus::Running);
            let command = CommandSpec::shell(context.substitute(&step.command));
            reporter.command(&step.name, command.display());
            tracing::info!(image = %image.name, step = %step.name, "Running step");

            match self
                .executor
                .run_streaming(&command, line_forwarder(reporter))
                .await
            {
                Ok(()) => {
                    on_status(index, StepStatus::Success);
                    if !self.pacing.is_zero() {
                        tokio::time::sleep(self.pacing).await;
                    }
                }
                Err(e) => {
                    on_status(index, StepStatus::Failed);
                    has_failed = true;
                    tracing::warn!(image = %image.name, step = %step.name, "Step failed: {}", e);
                    self.error_log.append(
                        &image.name,
                        format!(
                            "step '{}' failed: {}. Command: {}",
                            step.name,
                            e,
                            command.display()
                        ),
                    );
                }
            }
        }

        if has_failed {
            return Err(CtgenError::Command(format!(
                "one or more steps failed for {}",
                image.name
            )));
        }
        Ok(())
    }
}

/// Output callback that forwards each line to the image's reporter.
fn line_forwarder(reporter: &Reporter) -> LineCallback {
    let reporter = reporter.clone();
    Arc::new(move |stream: OutputStream, line: &str| {
        match stream {
            OutputStream::Stdout => {
                tracing::debug!(target: "ctgen::exec", image = %reporter.image(), "{}", line)
            }
            OutputStream::Stderr => {
                tracing::warn!(target: "ctgen::exec", image = %reporter.image(), "{}", line)
            }
        }
        reporter.output(line);
    })
}
