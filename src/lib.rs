// src/lib.rs
// =============================================================================
// url-hasher: fetch a batch of HTTP(S) resources concurrently and report a
// digest of every response body through a callback.
//
// Modules:
// - hasher: the worker pool engine (Hasher, HasherBuilder, FetchScope)
// - digest: digest algorithms and the Digest value
// - error: engine-level and per-URL error types
// =============================================================================

pub mod digest;
pub mod error;
pub mod hasher;

pub use digest::{Algorithm, Digest};
pub use error::{Error, FailureKind, FetchError, Result};
pub use hasher::{
    FetchOutcome, FetchScope, Hasher, HasherBuilder, HasherConfig, Termination,
    DEFAULT_FETCH_TIMEOUT, DEFAULT_PARALLEL,
};

// Re-exported so callers can build scopes without naming tokio-util
pub use tokio_util::sync::CancellationToken;
