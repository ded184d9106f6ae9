#![allow(dead_code)]

use assert_cmd::Command;
use ctgen_test_utils::{FixtureServer, StatusCode};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Isolated working directory plus a local HTTP server for image downloads.
pub struct TestContext {
    pub home: PathBuf,
    pub server: Option<FixtureServer>,
    // Server tasks run here while the CLI runs on the test thread
    runtime: tokio::runtime::Runtime,
    _temp_dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let home = temp_dir.path().to_path_buf();
        for dir in ["config", "cloudinit", "iso", "snippets"] {
            std::fs::create_dir_all(home.join(dir)).unwrap();
        }
        let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");

        Self {
            home,
            server: None,
            runtime,
            _temp_dir: temp_dir,
        }
    }

    /// Serve `files` as `/<name>` with status 200.
    pub fn serve(&mut self, files: &[(&str, &[u8])]) {
        let routes: Vec<_> = files
            .iter()
            .map(|(name, body)| (format!("/{name}"), StatusCode::OK, body.to_vec()))
            .collect();

        let server = self
            .runtime
            .block_on(FixtureServer::start(routes))
            .expect("Failed to start fixture server");
        self.server = Some(server);
    }

    pub fn url(&self, name: &str) -> String {
        let server = self.server.as_ref().expect("serve() not called");
        server.url(&format!("/{name}"))
    }

    pub fn write_config(&self, images: &str, steps: &str) {
        std::fs::write(self.home.join("config/os_list.json"), images).unwrap();
        std::fs::write(self.home.join("config/steps.json"), steps).unwrap();
    }

    pub fn write_vendor(&self, vendor: &str) {
        std::fs::write(
            self.home.join("cloudinit").join(vendor),
            "#cloud-config\npackage_update: true\n",
        )
        .unwrap();
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.home.join(rel)
    }

    /// `ctgen` with every host path redirected into the temp dir.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_ctgen"));
        cmd.timeout(Duration::from_secs(60));
        for var in [
            "CTGEN_HOME",
            "CTGEN_IMAGES",
            "CTGEN_STEPS",
            "CTGEN_CLOUDINIT_DIR",
            "CTGEN_STAGING_FILE",
            "CTGEN_LOG_FILE",
            "RUST_LOG",
        ] {
            cmd.env_remove(var);
        }
        cmd.arg("--home").arg(&self.home);
        cmd
    }

    pub fn run_cmd(&self) -> Command {
        let mut cmd = self.cmd();
        cmd.arg("run")
            .arg("--iso-dir")
            .arg(self.home.join("iso"))
            .arg("--snippets-dir")
            .arg(self.home.join("snippets"))
            .args(["--pacing-ms", "0"]);
        cmd
    }
}

pub fn image_json(id: u32, name: &str, url: &str, vendor: &str) -> String {
    format!(
        r#"{{"id": {id}, "name": "{name}", "url": "{url}", "checksum_url": "", "tags": "test", "vendor": "{vendor}"}}"#
    )
}
