use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use ctgen::constants::{dirs, host_paths};
use ctgen::sink::{FanoutSink, Serialized, SharedSink, TracingSink};
use ctgen::{GeneratorOptions, HostLayout, PipelineDriver};

use crate::console::ConsoleSink;
use crate::report;

/// Exit status after Ctrl-C, as a shell reports SIGINT.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// The run was cut short by Ctrl-C.
#[derive(Debug)]
pub struct Interrupted;

impl std::fmt::Display for Interrupted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("interrupted")
    }
}

impl std::error::Error for Interrupted {}

/// Process exit status for an error returned by a command.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if err.is::<Interrupted>() {
        INTERRUPTED_EXIT_CODE
    } else {
        1
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Image cache directory
    #[arg(long, env = "CTGEN_ISO_DIR", default_value = host_paths::ISO_DIR)]
    pub iso_dir: PathBuf,

    /// Directory receiving the vendor cloud-init snippet
    #[arg(long, env = "CTGEN_SNIPPETS_DIR", default_value = host_paths::SNIPPETS_DIR)]
    pub snippets_dir: PathBuf,

    /// Per-image error logs [default: <home>/logs]
    #[arg(long, env = "CTGEN_LOGS_DIR")]
    pub logs_dir: Option<PathBuf>,

    /// Pause after each successful step, in milliseconds
    #[arg(long, env = "CTGEN_PACING_MS", default_value_t = 1000)]
    pub pacing_ms: u64,
}

impl RunArgs {
    pub fn options(&self, global: &crate::cli::GlobalFlags) -> GeneratorOptions {
        let layout = HostLayout {
            iso_dir: self.iso_dir.clone(),
            snippets_dir: self.snippets_dir.clone(),
            cloudinit_dir: global.cloudinit_dir(),
            logs_dir: self
                .logs_dir
                .clone()
                .unwrap_or_else(|| global.work_dir().join(dirs::LOGS_DIR)),
            staging_file: global.staging_file(),
        };

        GeneratorOptions::new(layout).with_pacing(Duration::from_millis(self.pacing_ms))
    }
}

pub async fn execute(args: RunArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let (images, steps) = global.load_config()?;
    let options = args.options(global);

    options.layout.prepare()?;

    let console: SharedSink = Arc::new(Serialized::new(ConsoleSink::stdout()));
    let sink: SharedSink = Arc::new(FanoutSink::new(vec![console, Arc::new(TracingSink)]));
    let driver = PipelineDriver::with_defaults(options, sink);

    tracing::info!(
        images = images.len(),
        steps = steps.len(),
        "Starting template generation"
    );

    let summary = tokio::select! {
        summary = driver.run(&images, &steps) => summary,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted; partially provisioned resources are left in place");
            eprintln!(
                "\nInterrupted. The staging file {} and any resources created so far were left in place.",
                driver.layout().staging_file.display()
            );
            return Err(Interrupted.into());
        }
    };

    println!();
    println!("{}", report::render_table(&summary));
    print!("{}", report::final_message(&summary));

    let failed = summary.failed_images();
    if !failed.is_empty() {
        let errors: Vec<String> = failed
            .iter()
            .map(|name| {
                format!(
                    "{}: see {}",
                    name,
                    driver.layout().error_log_path(name).display()
                )
            })
            .collect();

        anyhow::bail!(
            "Failed to build {} of {} image(s)\nErrors:\n  {}",
            failed.len(),
            summary.results.len(),
            errors.join("\n  ")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_layout_defaults_follow_home() {
        let cli = Cli::parse_from([
            "ctgen",
            "--home",
            "/srv/ctgen",
            "run",
            "--iso-dir",
            "/data/iso",
            "--snippets-dir",
            "/data/snippets",
            "--pacing-ms",
            "0",
        ]);
        let crate::cli::Commands::Run(args) = cli.command else {
            panic!("expected run");
        };

        let options = args.options(&cli.global);
        assert_eq!(options.layout.iso_dir, PathBuf::from("/data/iso"));
        assert_eq!(
            options.layout.cloudinit_dir,
            PathBuf::from("/srv/ctgen/cloudinit")
        );
        assert_eq!(options.layout.logs_dir, PathBuf::from("/srv/ctgen/logs"));
        assert_eq!(
            options.layout.staging_file,
            PathBuf::from("/srv/ctgen/base.qcow2")
        );
        assert!(options.pacing.is_zero());
    }

    #[test]
    fn test_exit_code_for_interrupt() {
        assert_eq!(exit_code(&Interrupted.into()), INTERRUPTED_EXIT_CODE);
        assert_eq!(exit_code(&anyhow::anyhow!("Failed to build 1 of 2 image(s)")), 1);
    }
}
