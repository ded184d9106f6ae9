//! End-to-end tests for the pipeline driver with spy collaborators.
//!
//! Test categories:
//! - Full runs: success, provisioning failure, failure isolation between images
//! - Early failures: acquisition, staging copy, missing cloud-init snippet
//! - Side-channel failures: staging file removal
//! - Event stream: command display, final summary

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ctgen::exec::{CommandExecutor, CommandSpec, LineCallback};
use ctgen::pipeline::{ImageOutcome, PipelineDriver};
use ctgen::sink::{CollectingSink, PipelineEvent};
use ctgen::{CtgenResult, GeneratorOptions, ImageSpec, StepSpec, StepStatus};
use ctgen_test_utils::{SpyExecutor, SpyFetcher};
use tempfile::TempDir;

// ============================================================================
// TEST FIXTURES
// ============================================================================

struct TestContext {
    options: GeneratorOptions,
    sink: Arc<CollectingSink>,
    _temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let options = GeneratorOptions::rooted_at(temp_dir.path());
        options.layout.prepare().unwrap();

        std::fs::create_dir_all(&options.layout.cloudinit_dir).unwrap();
        for vendor in ["debian.yaml", "ubuntu.yaml"] {
            std::fs::write(
                options.layout.cloudinit_dir.join(vendor),
                format!("#cloud-config\n# {vendor}\n"),
            )
            .unwrap();
        }

        Self {
            options,
            sink: Arc::new(CollectingSink::new()),
            _temp_dir: temp_dir,
        }
    }

    fn driver(&self, fetcher: &Arc<SpyFetcher>, executor: &Arc<SpyExecutor>) -> PipelineDriver {
        PipelineDriver::new(
            self.options.clone(),
            fetcher.clone(),
            executor.clone(),
            self.sink.clone(),
        )
    }

    /// Final status per step index, from the emitted event stream.
    fn final_statuses(&self, image: &str) -> Vec<StepStatus> {
        let mut last = BTreeMap::new();
        for (index, status) in self.sink.transitions(image) {
            last.insert(index, status);
        }
        last.into_values().collect()
    }
}

fn image(id: u32, name: &str, vendor: &str) -> ImageSpec {
    ImageSpec {
        id,
        name: name.into(),
        url: format!("https://images.example.org/{name}"),
        checksum_url: String::new(),
        tags: "cloud".into(),
        vendor: vendor.into(),
    }
}

fn steps() -> Vec<StepSpec> {
    vec![
        StepSpec {
            name: "Create VM".into(),
            command: "qm create {{.ID}} --name {{.Name}} --tags {{.Tags}}".into(),
        },
        StepSpec {
            name: "Import disk".into(),
            command: "qm importdisk {{.ID}} {{.FilePath}} local-lvm".into(),
        },
        StepSpec {
            name: "Convert to template".into(),
            command: "qm template {{.ID}} # {{.Vendor}}".into(),
        },
    ]
}

fn fetcher_for(images: &[ImageSpec]) -> Arc<SpyFetcher> {
    let fetcher = images.iter().fold(SpyFetcher::new(), |f, img| {
        f.with_body(img.url.clone(), format!("disk of {}", img.name))
    });
    Arc::new(fetcher)
}

// ============================================================================
// FULL RUNS
// ============================================================================

#[tokio::test]
async fn two_images_second_fails_at_second_step() {
    let ctx = TestContext::new();
    let images = vec![
        image(9001, "debian-12.qcow2", "debian.yaml"),
        image(9002, "ubuntu-24.04.img", "ubuntu.yaml"),
    ];
    let fetcher = fetcher_for(&images);
    let executor = Arc::new(SpyExecutor::new().fail_when_contains("qm importdisk 9002"));

    let summary = ctx.driver(&fetcher, &executor).run(&images, &steps()).await;

    // Summary lists exactly the failing image
    assert_eq!(summary.failed_images(), vec!["ubuntu-24.04.img"]);
    assert_eq!(summary.results[0].outcome, ImageOutcome::Success);
    assert_eq!(summary.results[1].outcome, ImageOutcome::Failed);

    // One terminal status per step: 2 static + 3 declared
    assert_eq!(
        ctx.final_statuses("debian-12.qcow2"),
        vec![StepStatus::Success; 5]
    );
    assert_eq!(
        ctx.final_statuses("ubuntu-24.04.img"),
        vec![
            StepStatus::Success,
            StepStatus::Success,
            StepStatus::Success,
            StepStatus::Failed,
            StepStatus::Skipped,
        ]
    );

    // The skipped step never ran
    let commands = executor.commands();
    assert_eq!(commands.len(), 5);
    assert!(commands.contains(&"qm template 9001 # debian.yaml".to_string()));
    assert!(!commands.iter().any(|c| c.starts_with("qm template 9002")));

    let error_log = ctx.options.layout.error_log_path("ubuntu-24.04.img");
    let log = std::fs::read_to_string(error_log).unwrap();
    assert!(log.contains("step 'Import disk' failed"));
    assert!(log.contains("Command: qm importdisk 9002"));
    assert!(!ctx.options.layout.error_log_path("debian-12.qcow2").exists());
}

#[tokio::test]
async fn placeholders_and_staging_file() {
    let ctx = TestContext::new();
    let images = vec![image(9001, "debian-12.qcow2", "debian.yaml")];
    let fetcher = fetcher_for(&images);
    let executor = Arc::new(SpyExecutor::new());

    let summary = ctx.driver(&fetcher, &executor).run(&images, &steps()).await;
    assert!(summary.all_succeeded());

    let staging = ctx.options.layout.staging_file.display().to_string();
    assert_eq!(
        executor.commands(),
        vec![
            "qm create 9001 --name debian-12.qcow2 --tags cloud".to_string(),
            format!("qm importdisk 9001 {staging} local-lvm"),
            "qm template 9001 # debian.yaml".to_string(),
        ]
    );
    assert_eq!(executor.invocations()[0].program, "bash");

    // Staged copy is removed, cache and snippet remain
    assert!(!ctx.options.layout.staging_file.exists());
    assert!(ctx.options.layout.image_path("debian-12.qcow2").exists());
    assert!(ctx.options.layout.vendor_snippet_target("debian.yaml").exists());
}

#[tokio::test]
async fn every_image_ends_settled() {
    let ctx = TestContext::new();
    let images = vec![
        image(9001, "a.qcow2", "debian.yaml"),
        image(9002, "b.qcow2", "debian.yaml"),
        image(9003, "c.qcow2", "ubuntu.yaml"),
    ];
    let fetcher = fetcher_for(&images);
    let executor = Arc::new(SpyExecutor::new().fail_when_contains("qm create 9002"));

    ctx.driver(&fetcher, &executor).run(&images, &steps()).await;

    for img in &images {
        let statuses = ctx.final_statuses(&img.name);
        assert_eq!(statuses.len(), 5, "{}", img.name);
        assert!(statuses.iter().all(StepStatus::is_terminal), "{}", img.name);
    }
    assert_eq!(
        ctx.final_statuses("b.qcow2")[2..],
        [StepStatus::Failed, StepStatus::Skipped, StepStatus::Skipped]
    );
}

// ============================================================================
// EARLY FAILURES
// ============================================================================

#[tokio::test]
async fn acquisition_failure_skips_everything_after() {
    let ctx = TestContext::new();
    let images = vec![
        image(9001, "missing.qcow2", "debian.yaml"),
        image(9002, "debian-12.qcow2", "debian.yaml"),
    ];
    // Only the second image is downloadable
    let fetcher = fetcher_for(&images[1..]);
    let executor = Arc::new(SpyExecutor::new());

    let summary = ctx.driver(&fetcher, &executor).run(&images, &steps()).await;

    assert_eq!(summary.failed_images(), vec!["missing.qcow2"]);
    assert_eq!(
        ctx.final_statuses("missing.qcow2"),
        vec![
            StepStatus::Failed,
            StepStatus::Skipped,
            StepStatus::Skipped,
            StepStatus::Skipped,
            StepStatus::Skipped,
        ]
    );
    assert!(executor.commands().iter().all(|c| !c.contains("9001")));
    assert_eq!(executor.call_count(), 3);

    let log =
        std::fs::read_to_string(ctx.options.layout.error_log_path("missing.qcow2")).unwrap();
    assert!(log.contains("download failed"));
}

#[tokio::test]
async fn staging_copy_failure_skips_provisioning() {
    let mut ctx = TestContext::new();
    ctx.options.layout.staging_file = ctx.options.layout.iso_dir.join("gone/base.qcow2");
    let images = vec![image(9001, "debian-12.qcow2", "debian.yaml")];
    let fetcher = fetcher_for(&images);
    let executor = Arc::new(SpyExecutor::new());

    let summary = ctx.driver(&fetcher, &executor).run(&images, &steps()).await;

    assert_eq!(summary.failed_images(), vec!["debian-12.qcow2"]);
    assert_eq!(
        ctx.final_statuses("debian-12.qcow2"),
        vec![
            StepStatus::Success,
            StepStatus::Failed,
            StepStatus::Skipped,
            StepStatus::Skipped,
            StepStatus::Skipped,
        ]
    );
    assert_eq!(executor.call_count(), 0);

    let log =
        std::fs::read_to_string(ctx.options.layout.error_log_path("debian-12.qcow2")).unwrap();
    assert!(log.contains("copy"));
    assert!(log.contains("gone/base.qcow2"));
}

#[tokio::test]
async fn missing_snippet_fails_before_any_command() {
    let ctx = TestContext::new();
    let images = vec![image(9001, "arch.qcow2", "arch.yaml")];
    let fetcher = fetcher_for(&images);
    let executor = Arc::new(SpyExecutor::new());

    let summary = ctx.driver(&fetcher, &executor).run(&images, &steps()).await;

    assert_eq!(summary.failed_images(), vec!["arch.qcow2"]);
    assert_eq!(executor.call_count(), 0);
    assert_eq!(
        ctx.final_statuses("arch.qcow2"),
        vec![
            StepStatus::Success,
            StepStatus::Success,
            StepStatus::Skipped,
            StepStatus::Skipped,
            StepStatus::Skipped,
        ]
    );
    assert!(!ctx.options.layout.staging_file.exists());
}

// ============================================================================
// SIDE-CHANNEL FAILURES
// ============================================================================

/// Succeeds every command, deleting the staging file on the way.
struct StagingRemover {
    staging: PathBuf,
    calls: AtomicUsize,
}

#[async_trait]
impl CommandExecutor for StagingRemover {
    async fn run_streaming(&self, _command: &CommandSpec, _on_line: LineCallback) -> CtgenResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = std::fs::remove_file(&self.staging);
        Ok(())
    }
}

#[tokio::test]
async fn staging_removal_failure_keeps_success() {
    let ctx = TestContext::new();
    let images = vec![image(9001, "debian-12.qcow2", "debian.yaml")];
    let fetcher = fetcher_for(&images);
    let executor = Arc::new(StagingRemover {
        staging: ctx.options.layout.staging_file.clone(),
        calls: AtomicUsize::new(0),
    });

    let driver = PipelineDriver::new(
        ctx.options.clone(),
        fetcher.clone(),
        executor.clone(),
        ctx.sink.clone(),
    );
    let summary = driver.run(&images, &steps()).await;

    assert!(summary.all_succeeded());
    assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        ctx.final_statuses("debian-12.qcow2"),
        vec![StepStatus::Success; 5]
    );

    let log =
        std::fs::read_to_string(ctx.options.layout.error_log_path("debian-12.qcow2")).unwrap();
    assert!(log.contains("failed to remove"));
    assert!(log.contains("base.qcow2"));
}

// ============================================================================
// EVENT STREAM
// ============================================================================

#[tokio::test]
async fn events_bracket_each_image_and_the_run() {
    let ctx = TestContext::new();
    let images = vec![image(9001, "debian-12.qcow2", "debian.yaml")];
    let fetcher = fetcher_for(&images);
    let executor = Arc::new(SpyExecutor::new().fail_when_contains("qm template"));

    ctx.driver(&fetcher, &executor).run(&images, &steps()).await;

    let events = ctx.sink.events();
    assert_eq!(
        events.first(),
        Some(&PipelineEvent::ImageStarted {
            image: "debian-12.qcow2".into()
        })
    );
    assert_eq!(
        events.last(),
        Some(&PipelineEvent::RunFinished {
            failed: vec!["debian-12.qcow2".into()]
        })
    );
    assert!(events.contains(&PipelineEvent::ImageFinished {
        image: "debian-12.qcow2".into(),
        outcome: ImageOutcome::Failed,
    }));

    let commands: Vec<(String, String)> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::CommandStarted { step, display, .. } => {
                Some((step.clone(), display.clone()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(commands.len(), 4);
    assert_eq!(commands[0].0, "Copy Image");
    assert!(commands[0].1.starts_with("cp "));
    assert!(commands[0].1.ends_with("base.qcow2"));

    let output = ctx.sink.output("debian-12.qcow2");
    assert!(output.iter().any(|l| l == "Copy complete."));
}
