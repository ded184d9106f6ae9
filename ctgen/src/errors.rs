//! Error types for the template generator.
//!
//! Errors are categorized by where they stop the run:
//! - [`CtgenError::Checksum`] / [`CtgenError::UnsupportedAlgorithm`]: absorbed by
//!   acquisition and turned into a re-download
//! - [`CtgenError::Network`], [`CtgenError::Storage`], [`CtgenError::Command`]:
//!   stage-fatal for one image, never for the whole run
//! - [`CtgenError::Config`]: reported before any image is processed

use thiserror::Error;

/// Errors that can occur while generating templates.
#[derive(Debug, Error)]
pub enum CtgenError {
    /// Configuration could not be read or parsed.
    #[error("config: {0}")]
    Config(String),

    /// Local filesystem operation failed (cache, staging file, logs).
    #[error("storage: {0}")]
    Storage(String),

    /// HTTP request failed or returned a non-success status.
    #[error("network: {0}")]
    Network(String),

    /// No digest for the requested file could be located in a manifest.
    #[error("checksum: {0}")]
    Checksum(String),

    /// A digest was found but its length maps to no known algorithm.
    #[error("unsupported checksum length: {0}")]
    UnsupportedAlgorithm(usize),

    /// External command could not be spawned or exited unsuccessfully.
    #[error("command: {0}")]
    Command(String),

    /// Step status transition that the state machine forbids.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Unexpected internal failure (thread spawn, task join).
    #[error("internal: {0}")]
    Internal(String),
}

pub type CtgenResult<T> = Result<T, CtgenError>;
