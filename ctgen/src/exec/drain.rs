//! Concurrent draining of a child's stdout and stderr.

use std::{
    io::{BufRead, BufReader, Read},
    process::{ChildStderr, ChildStdout},
    thread::{self, JoinHandle},
};

use super::{LineCallback, OutputStream};
use crate::errors::{CtgenError, CtgenResult};

/// Owns one reader thread per output stream of a child process.
///
/// Both pipes are read at the same time so that a chatty stream can never
/// fill its OS pipe buffer and stall the child while the other stream is
/// being read. Lines keep their order within a stream; there is no
/// ordering between the two streams.
pub(super) struct OutputDrain {
    stdout_thread: Option<JoinHandle<()>>,
    stderr_thread: Option<JoinHandle<()>>,
}

impl OutputDrain {
    pub(super) fn new() -> Self {
        Self {
            stdout_thread: None,
            stderr_thread: None,
        }
    }

    /// Spawn reader threads for both pipes, forwarding each line to `on_line`.
    ///
    /// On error a reader that already started stays owned by `self`, so the
    /// caller can stop the child and then join it.
    pub(super) fn start(
        &mut self,
        stdout: ChildStdout,
        stderr: ChildStderr,
        on_line: LineCallback,
    ) -> CtgenResult<()> {
        self.start_with(
            Box::new(stdout),
            Box::new(stderr),
            on_line,
            Self::spawn_reader_thread,
        )
    }

    fn start_with<F>(
        &mut self,
        stdout: Box<dyn Read + Send>,
        stderr: Box<dyn Read + Send>,
        on_line: LineCallback,
        mut spawn: F,
    ) -> CtgenResult<()>
    where
        F: FnMut(
            BufReader<Box<dyn Read + Send>>,
            OutputStream,
            LineCallback,
        ) -> CtgenResult<JoinHandle<()>>,
    {
        self.stdout_thread = Some(spawn(
            BufReader::new(stdout),
            OutputStream::Stdout,
            on_line.clone(),
        )?);
        self.stderr_thread = Some(spawn(
            BufReader::new(stderr),
            OutputStream::Stderr,
            on_line,
        )?);
        Ok(())
    }

    /// Strips ANSI escape codes from a line.
    ///
    /// Output ends up in plain log files and line-oriented terminals.
    pub(super) fn strip_ansi_codes(text: &str) -> String {
        let mut result = String::with_capacity(text.len());
        let mut chars = text.chars();

        while let Some(c) = chars.next() {
            if c == '\x1b' {
                if chars.next() == Some('[') {
                    for next_char in chars.by_ref() {
                        if next_char == 'm' {
                            break;
                        }
                    }
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Read `reader` line by line until EOF, invoking `on_line` per line.
    ///
    /// Invalid UTF-8 is replaced rather than ending the stream. A read error
    /// is logged and ends the stream; it does not fail the command, whose
    /// exit status stays authoritative.
    fn pump<R: Read>(mut reader: BufReader<R>, stream: OutputStream, on_line: &LineCallback) {
        let mut buf = Vec::with_capacity(256);
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    while matches!(buf.last(), Some(b'\n' | b'\r')) {
                        buf.pop();
                    }
                    let line = Self::strip_ansi_codes(&String::from_utf8_lossy(&buf));
                    on_line(stream, &line);
                }
                Err(e) => {
                    tracing::error!(
                        target: "ctgen::exec",
                        stream = %stream,
                        "Failed to read from pipe: {}", e
                    );
                    break;
                }
            }
        }
        tracing::trace!(target: "ctgen::exec", stream = %stream, "Pipe closed, thread exiting");
    }

    fn spawn_reader_thread<R: Read + Send + 'static>(
        reader: BufReader<R>,
        stream: OutputStream,
        on_line: LineCallback,
    ) -> CtgenResult<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("ctgen-{}", stream))
            .spawn(move || Self::pump(reader, stream, &on_line))
            .map_err(|e| {
                CtgenError::Internal(format!("Failed to spawn {} reader thread: {}", stream, e))
            })
    }

    /// Block until both streams reach end-of-file.
    pub(super) fn join(mut self) {
        if let Some(handle) = self.stdout_thread.take()
            && let Err(e) = handle.join()
        {
            tracing::warn!(target: "ctgen::exec", "stdout reader thread panicked: {:?}", e);
        }

        if let Some(handle) = self.stderr_thread.take()
            && let Err(e) = handle.join()
        {
            tracing::warn!(target: "ctgen::exec", "stderr reader thread panicked: {:?}", e);
        }
    }
}

impl Drop for OutputDrain {
    /// Threads are always joined, even on early return.
    fn drop(&mut self) {
        if let Some(handle) = self.stdout_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.stderr_thread.take() {
            let _ = handle.join();
        }
    }
}
