//! Running external commands with live output.

mod drain;

use std::fmt;
use std::process::{Command, Stdio};
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::{CtgenError, CtgenResult};
use drain::OutputDrain;

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Per-line output callback. Invoked from two threads at once.
pub type LineCallback = Arc<dyn Fn(OutputStream, &str) + Send + Sync>;

/// Program plus argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `bash -c <script>`.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("bash", vec!["-c".to_string(), script.into()])
    }

    /// What an operator would type. For `bash -c` this is the script itself.
    pub fn display(&self) -> String {
        if self.program == "bash"
            && self.args.len() == 2
            && self.args[0] == "-c"
        {
            return self.args[1].clone();
        }

        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Runs one command to completion while streaming its output.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Resolves once both output streams are fully drained and the process
    /// has exited. A non-zero exit or spawn failure is an error.
    async fn run_streaming(&self, command: &CommandSpec, on_line: LineCallback)
    -> CtgenResult<()>;
}

/// [`CommandExecutor`] backed by real OS processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }

    fn run_blocking(command: &CommandSpec, on_line: LineCallback) -> CtgenResult<()> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            CtgenError::Command(format!(
                "failed to start command {}: {}",
                command.program, e
            ))
        })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CtgenError::Internal(
                "child process has no output pipes".to_string(),
            ));
        };

        let mut drain = OutputDrain::new();
        if let Err(e) = drain.start(stdout, stderr, on_line) {
            let _ = child.kill();
            let _ = child.wait();
            drain.join();
            return Err(e);
        }

        // Both streams must hit EOF before the exit status is consulted.
        drain.join();

        let status = child.wait().map_err(|e| {
            CtgenError::Command(format!("failed to wait for {}: {}", command.program, e))
        })?;

        tracing::debug!(target: "ctgen::exec", command = %command, %status, "Command exited");

        if !status.success() {
            return Err(CtgenError::Command(format!("command failed: {}", status)));
        }
        Ok(())
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn run_streaming(
        &self,
        command: &CommandSpec,
        on_line: LineCallback,
    ) -> CtgenResult<()> {
        let command = command.clone();
        tokio::task::spawn_blocking(move || Self::run_blocking(&command, on_line))
            .await
            .map_err(|e| CtgenError::Internal(format!("command task failed: {}", e)))?
    }
}
