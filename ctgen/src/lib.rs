//! Turn declared cloud disk images into Proxmox VE templates.
//!
//! For each image the pipeline acquires and verifies the disk file, stages
//! a working copy, then runs the declared provisioning commands against it,
//! reporting every step to an [`EventSink`].

pub mod acquire;
pub mod checksum;
pub mod config;
pub mod constants;
pub mod errors;
pub mod exec;
pub mod fetch;
pub mod layout;
pub mod logging;
pub mod options;
pub mod pipeline;
pub mod provision;
pub mod sink;
pub mod status;

pub use acquire::Acquirer;
pub use checksum::{ChecksumAlgorithm, ChecksumRecord};
pub use config::{ImageSpec, StepSpec, load_images, load_steps};
pub use errors::{CtgenError, CtgenResult};
pub use exec::{CommandExecutor, CommandSpec, LineCallback, OutputStream, ProcessExecutor};
pub use fetch::{Fetcher, HttpFetcher};
pub use layout::HostLayout;
pub use options::GeneratorOptions;
pub use pipeline::{ImageOutcome, ImagePhase, PipelineDriver, PipelineResult, RunSummary, StepBoard};
pub use provision::{Provisioner, StepContext};
pub use sink::{
    CollectingSink, ErrorLog, EventHandler, EventSink, FanoutSink, PipelineEvent, Reporter,
    Serialized, SharedSink, TracingSink,
};
pub use status::StepStatus;
