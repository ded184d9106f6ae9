//! Host filesystem layout consumed and produced by a run.

use crate::constants::{dirs, envs, filenames, host_paths};
use crate::errors::{CtgenError, CtgenResult};
use crate::sink::ErrorLog;
use std::path::{Path, PathBuf};

/// Where images are cached, staged, logged and where cloud-init snippets go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostLayout {
    /// Image cache: `<iso_dir>/<image name>`.
    pub iso_dir: PathBuf,
    pub snippets_dir: PathBuf,
    /// Source of per-vendor cloud-init files.
    pub cloudinit_dir: PathBuf,
    pub logs_dir: PathBuf,
    /// Fixed-name working copy, reused by every image.
    pub staging_file: PathBuf,
}

impl HostLayout {
    /// Layout with Proxmox storage paths and everything else under `work_dir`.
    pub fn with_work_dir(work_dir: &Path) -> Self {
        Self {
            iso_dir: PathBuf::from(host_paths::ISO_DIR),
            snippets_dir: PathBuf::from(host_paths::SNIPPETS_DIR),
            cloudinit_dir: work_dir.join(dirs::CLOUDINIT_DIR),
            logs_dir: work_dir.join(dirs::LOGS_DIR),
            staging_file: work_dir.join(filenames::STAGING_FILE),
        }
    }

    /// Layout with every directory under `root` (tests, non-Proxmox hosts).
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            iso_dir: root.join("iso"),
            snippets_dir: root.join("snippets"),
            cloudinit_dir: root.join(dirs::CLOUDINIT_DIR),
            logs_dir: root.join(dirs::LOGS_DIR),
            staging_file: root.join(filenames::STAGING_FILE),
        }
    }

    pub fn image_path(&self, image_name: &str) -> PathBuf {
        self.iso_dir.join(image_name)
    }

    /// Error log writer rooted at `logs_dir`.
    pub fn error_log(&self) -> ErrorLog {
        ErrorLog::new(self.logs_dir.clone())
    }

    pub fn error_log_path(&self, image_name: &str) -> PathBuf {
        self.error_log().path_for(image_name)
    }

    pub fn vendor_snippet_source(&self, vendor: &str) -> PathBuf {
        self.cloudinit_dir.join(vendor)
    }

    pub fn vendor_snippet_target(&self, vendor: &str) -> PathBuf {
        self.snippets_dir.join(vendor)
    }

    /// Create the cache, snippets and logs directories.
    ///
    /// This is the only failure that aborts a whole run.
    pub fn prepare(&self) -> CtgenResult<()> {
        std::fs::create_dir_all(&self.iso_dir).map_err(|e| {
            CtgenError::Storage(format!(
                "Error creating iso folder {}: {}. Do you have proper permissions?",
                self.iso_dir.display(),
                e
            ))
        })?;

        std::fs::create_dir_all(&self.snippets_dir).map_err(|e| {
            CtgenError::Storage(format!(
                "Error creating snippets folder {}: {}. Do you have proper permissions?",
                self.snippets_dir.display(),
                e
            ))
        })?;

        std::fs::create_dir_all(&self.logs_dir).map_err(|e| {
            CtgenError::Storage(format!(
                "Error creating logs folder {}: {}",
                self.logs_dir.display(),
                e
            ))
        })?;

        Ok(())
    }
}

impl Default for HostLayout {
    fn default() -> Self {
        Self::with_work_dir(&default_work_dir())
    }
}

/// `$CTGEN_HOME`, falling back to the current directory.
pub fn default_work_dir() -> PathBuf {
    std::env::var(envs::CTGEN_HOME)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}
