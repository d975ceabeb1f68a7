// src/error.rs
// =============================================================================
// Error types for the url-hasher library.
//
// Two layers:
// - Error: problems with the engine itself (bad configuration, no HTTP
//   client). These are returned from the builder.
// - FetchError: why a single URL could not be hashed. These never bubble
//   up from `Hasher::start`, they are handed to the completion callback.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for engine-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine-level error
#[derive(Debug, Error)]
pub enum Error {
    /// The worker pool needs at least one worker
    #[error("parallel must be at least 1, got {0}")]
    InvalidParallel(usize),

    /// `on_done` was never set on the builder
    #[error("no completion callback configured")]
    MissingCallback,

    /// The shared HTTP client could not be constructed
    #[error("could not build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// Digest algorithm name not recognised
    #[error("unknown digest algorithm: {0}")]
    UnknownAlgorithm(String),
}

/// Why a single URL produced no digest
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL string could not be parsed
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The URL parsed but no request could be built from it
    #[error("could not create HTTP request: {0}")]
    Request(#[source] reqwest::Error),

    /// Connection, DNS or TLS failure before a response arrived
    #[error("could not perform HTTP request: {0}")]
    Transport(#[source] reqwest::Error),

    /// The response body broke off while it was being hashed
    #[error("could not hash HTTP response: {0}")]
    BodyStream(#[source] reqwest::Error),

    /// The per-URL timeout elapsed
    #[error("fetch deadline of {0:?} exceeded")]
    Deadline(Duration),

    /// The surrounding scope was cancelled
    #[error("fetch cancelled")]
    Cancelled,
}

/// Coarse classification of a [`FetchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RequestConstruction,
    Transport,
    BodyStream,
    Deadline,
    Cancelled,
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            // Both mean nothing was sent
            FetchError::InvalidUrl(_) | FetchError::Request(_) => FailureKind::RequestConstruction,
            FetchError::Transport(_) => FailureKind::Transport,
            FetchError::BodyStream(_) => FailureKind::BodyStream,
            FetchError::Deadline(_) => FailureKind::Deadline,
            FetchError::Cancelled => FailureKind::Cancelled,
        }
    }

    /// Deadline and cancellation both come from the scope, not the network
    pub fn is_interrupted(&self) -> bool {
        matches!(self.kind(), FailureKind::Deadline | FailureKind::Cancelled)
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why keep the reqwest error as a source?
//    - The Display text stays short for the CLI line, while `{:#}` or
//      `source()` still reaches the underlying hyper/io cause
//
// 2. Why is FailureKind separate from FetchError?
//    - FetchError carries non-serializable reqwest errors; the kind is the
//      stable, serializable part used in --json output and in tests
// -----------------------------------------------------------------------------
