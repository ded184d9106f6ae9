use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ctgen::constants::{dirs, filenames};
use ctgen::layout::default_work_dir;

use crate::commands;

#[derive(Parser, Debug)]
#[command(
    name = "ctgen",
    version,
    about = "Build Proxmox VE templates from cloud disk images"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Acquire, stage and provision every declared image
    Run(commands::run::RunArgs),

    /// Show the steps each image would run, with placeholders filled in
    Plan(commands::plan::PlanArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct GlobalFlags {
    /// Working directory for config, cloud-init sources, logs and the staging file
    #[arg(long, global = true, env = "CTGEN_HOME")]
    pub home: Option<PathBuf>,

    /// Image list (JSON or YAML) [default: <home>/config/os_list.json]
    #[arg(long, global = true, env = "CTGEN_IMAGES")]
    pub images: Option<PathBuf>,

    /// Step list (JSON or YAML) [default: <home>/config/steps.json]
    #[arg(long, global = true, env = "CTGEN_STEPS")]
    pub steps: Option<PathBuf>,

    /// Per-vendor cloud-init sources [default: <home>/cloudinit]
    #[arg(long, global = true, env = "CTGEN_CLOUDINIT_DIR")]
    pub cloudinit_dir: Option<PathBuf>,

    /// Working copy the provisioning steps operate on [default: <home>/base.qcow2]
    #[arg(long, global = true, env = "CTGEN_STAGING_FILE")]
    pub staging_file: Option<PathBuf>,

    /// Write diagnostics to this file instead of stderr
    #[arg(long, global = true, env = "CTGEN_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl GlobalFlags {
    pub fn work_dir(&self) -> PathBuf {
        self.home.clone().unwrap_or_else(default_work_dir)
    }

    pub fn images_path(&self) -> PathBuf {
        self.images.clone().unwrap_or_else(|| {
            self.work_dir()
                .join(dirs::CONFIG_DIR)
                .join(filenames::IMAGES_FILE)
        })
    }

    pub fn steps_path(&self) -> PathBuf {
        self.steps.clone().unwrap_or_else(|| {
            self.work_dir()
                .join(dirs::CONFIG_DIR)
                .join(filenames::STEPS_FILE)
        })
    }

    pub fn cloudinit_dir(&self) -> PathBuf {
        self.cloudinit_dir
            .clone()
            .unwrap_or_else(|| self.work_dir().join(dirs::CLOUDINIT_DIR))
    }

    pub fn staging_file(&self) -> PathBuf {
        self.staging_file
            .clone()
            .unwrap_or_else(|| self.work_dir().join(filenames::STAGING_FILE))
    }

    /// Load both declaration files.
    pub fn load_config(&self) -> anyhow::Result<(Vec<ctgen::ImageSpec>, Vec<ctgen::StepSpec>)> {
        let images = ctgen::load_images(&self.images_path())
            .map_err(|e| anyhow::anyhow!("Error loading images: {}", e))?;
        let steps = ctgen::load_steps(&self.steps_path())
            .map_err(|e| anyhow::anyhow!("Error loading steps: {}", e))?;
        Ok((images, steps))
    }
}
