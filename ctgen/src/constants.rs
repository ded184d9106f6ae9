//! Constants for the template generator
//!
//! Centralized location for hardcoded paths, names and timings.

pub mod envs {
    pub const CTGEN_HOME: &str = "CTGEN_HOME";
}

/// Default host paths (Proxmox VE storage layout).
pub mod host_paths {
    /// Image cache, one file per image name.
    pub const ISO_DIR: &str = "/var/lib/vz/template/iso";

    /// Cloud-init vendor snippets referenced by VM configs.
    pub const SNIPPETS_DIR: &str = "/var/lib/vz/snippets";
}

/// Paths relative to the working directory.
pub mod dirs {
    pub const LOGS_DIR: &str = "logs";

    /// Per-vendor cloud-init files copied into the snippets dir.
    pub const CLOUDINIT_DIR: &str = "cloudinit";

    pub const CONFIG_DIR: &str = "config";
}

pub mod filenames {
    /// Working copy every provisioning step operates on.
    pub const STAGING_FILE: &str = "base.qcow2";

    pub const IMAGES_FILE: &str = "os_list.json";

    pub const STEPS_FILE: &str = "steps.json";

    pub const ERROR_LOG_SUFFIX: &str = ".error.log";
}

/// Built-in steps that precede the declared provisioning steps.
pub mod static_steps {
    pub const DOWNLOAD: &str = "Download/Verify";
    pub const COPY: &str = "Copy Image";

    pub const ALL: [&str; 2] = [DOWNLOAD, COPY];
}

pub mod timing {
    use std::time::Duration;

    /// Pause after each successful step so the operator can follow along.
    pub const STEP_PACING: Duration = Duration::from_secs(1);

    /// Minimum interval between two download progress reports.
    pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);
}

/// Placeholders recognized in step command templates.
pub mod placeholders {
    pub const ID: &str = "{{.ID}}";
    pub const NAME: &str = "{{.Name}}";
    pub const TAGS: &str = "{{.Tags}}";
    pub const VENDOR: &str = "{{.Vendor}}";
    pub const FILE_PATH: &str = "{{.FilePath}}";
}
