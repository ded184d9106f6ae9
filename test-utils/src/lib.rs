//! Shared test helpers: spy collaborators and a local HTTP fixture server.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::http::Uri;
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

use ctgen::exec::{CommandExecutor, CommandSpec, LineCallback, OutputStream};
use ctgen::fetch::{Fetcher, ProgressFn};
use ctgen::{CtgenError, CtgenResult};

pub use axum::http::StatusCode;
pub use ctgen::sink::CollectingSink;

// ============================================================================
// Spy executor
// ============================================================================

/// Records every command it is asked to run and never spawns anything.
///
/// A command fails when its display string contains one of the configured
/// failure markers. Each call first emits the configured output lines.
#[derive(Default)]
pub struct SpyExecutor {
    invocations: Mutex<Vec<CommandSpec>>,
    fail_markers: Mutex<Vec<String>>,
    lines: Mutex<Vec<(OutputStream, String)>>,
}

impl SpyExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any command whose display string contains `marker`.
    pub fn fail_when_contains(self, marker: impl Into<String>) -> Self {
        self.fail_markers.lock().push(marker.into());
        self
    }

    /// Emit `line` on `stream` for every invocation.
    pub fn with_line(self, stream: OutputStream, line: impl Into<String>) -> Self {
        self.lines.lock().push((stream, line.into()));
        self
    }

    pub fn invocations(&self) -> Vec<CommandSpec> {
        self.invocations.lock().clone()
    }

    /// Display strings of every invocation, in call order.
    pub fn commands(&self) -> Vec<String> {
        self.invocations
            .lock()
            .iter()
            .map(CommandSpec::display)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.invocations.lock().len()
    }
}

#[async_trait]
impl CommandExecutor for SpyExecutor {
    async fn run_streaming(
        &self,
        command: &CommandSpec,
        on_line: LineCallback,
    ) -> CtgenResult<()> {
        self.invocations.lock().push(command.clone());

        let lines = self.lines.lock().clone();
        for (stream, line) in &lines {
            on_line(*stream, line);
        }

        let display = command.display();
        if self
            .fail_markers
            .lock()
            .iter()
            .any(|marker| display.contains(marker.as_str()))
        {
            return Err(CtgenError::Command("command failed: exit status: 1".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Spy fetcher
// ============================================================================

/// In-memory [`Fetcher`]: manifests by URL, image bodies by URL.
#[derive(Default)]
pub struct SpyFetcher {
    texts: Mutex<HashMap<String, String>>,
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    text_fetches: AtomicUsize,
    downloads: AtomicUsize,
}

impl SpyFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.texts.lock().insert(url.into(), body.into());
        self
    }

    pub fn with_body(self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.lock().insert(url.into(), body.into());
        self
    }

    pub fn text_fetch_count(&self) -> usize {
        self.text_fetches.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for SpyFetcher {
    async fn fetch_text(&self, url: &str) -> CtgenResult<String> {
        self.text_fetches.fetch_add(1, Ordering::SeqCst);
        self.texts
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| CtgenError::Network("bad status: 404 Not Found".into()))
    }

    async fn download(
        &self,
        path: &Path,
        url: &str,
        on_progress: ProgressFn<'_>,
    ) -> CtgenResult<u64> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let body = self
            .bodies
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| CtgenError::Network("bad status: 404 Not Found".into()))?;

        tokio::fs::write(path, &body).await.map_err(|e| {
            CtgenError::Storage(format!("failed to write {}: {}", path.display(), e))
        })?;
        let len = body.len() as u64;
        on_progress(len, Some(len));
        Ok(len)
    }
}

// ============================================================================
// HTTP fixtures
// ============================================================================

type Routes = Arc<HashMap<String, (StatusCode, Vec<u8>)>>;

/// Local HTTP server answering fixed bodies by path. Unknown paths are 404.
pub struct FixtureServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl FixtureServer {
    pub async fn start<P: Into<String>>(
        routes: impl IntoIterator<Item = (P, StatusCode, Vec<u8>)>,
    ) -> std::io::Result<Self> {
        let routes: Routes = Arc::new(
            routes
                .into_iter()
                .map(|(path, status, body)| (path.into(), (status, body)))
                .collect(),
        );

        let app = Router::new().fallback(respond).with_state(routes);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { addr, handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn respond(State(routes): State<Routes>, uri: Uri) -> Response {
    match routes.get(uri.path()) {
        Some((status, body)) => (*status, body.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Serves one response declaring `declared_len` bytes but sending only
/// `body`, then closes the connection.
pub async fn serve_truncated(
    declared_len: usize,
    body: Vec<u8>,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 1024];
            let _ = tokio::io::AsyncReadExt::read(&mut socket, &mut request).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\n\r\n",
                declared_len
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&body).await;
            let _ = socket.shutdown().await;
        }
    });

    Ok((addr, handle))
}
