// src/hasher/fetch.rs
// =============================================================================
// The per-URL pipeline: GET the URL and stream its body into a hasher.
//
// Key points:
// - Each URL runs inside its own FetchScope, a child of the worker's
//   cancellation token with a deadline of now + fetch timeout
// - The body is consumed chunk by chunk, so memory use does not depend on
//   the size of the response
// - Every HTTP status is hashed; an error page is still a body
// =============================================================================

use crate::digest::{Algorithm, Digest};
use crate::error::FetchError;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

// Stand-in deadline for timeouts too large to add to `Instant::now()`,
// the same horizon tokio uses for its own "never" sleeps
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Cancellation scope of a single URL, handed to the completion callback.
///
/// The scope is cancelled when its deadline passes, when the batch is
/// cancelled, and in any case as soon as the callback returns.
#[derive(Debug, Clone)]
pub struct FetchScope {
    token: CancellationToken,
    deadline: Instant,
    timeout: Duration,
}

impl FetchScope {
    pub(crate) fn new(token: CancellationToken, timeout: Duration) -> Self {
        Self {
            token,
            deadline: deadline_after(timeout),
            timeout,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Runs `fut` until it finishes, the scope is cancelled or the deadline
    /// passes, whichever comes first. Losing the race drops `fut`, which
    /// aborts any transfer it has in flight.
    pub(crate) async fn run<T, F>(&self, fut: F) -> Result<T, FetchError>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        // Random branch order; if the fetch finishes in the same poll as
        // the deadline, either outcome is acceptable
        tokio::select! {
            _ = self.token.cancelled() => Err(FetchError::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => {
                self.token.cancel();
                Err(FetchError::Deadline(self.timeout))
            }
            result = fut => result,
        }
    }
}

// `Instant + Duration` panics on overflow, and a timeout like
// `Duration::MAX` is valid input meaning "effectively never"
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Fetches `url` with a bodiless GET and returns the digest of the body
pub(crate) async fn fetch_digest(
    client: &Client,
    url: &str,
    algorithm: Algorithm,
) -> Result<Digest, FetchError> {
    let target = Url::parse(url)?;
    let request = client.get(target).build().map_err(FetchError::Request)?;

    let mut response = client
        .execute(request)
        .await
        .map_err(FetchError::Transport)?;

    // Any status is fine, the body is hashed either way
    tracing::trace!(%url, status = %response.status(), "response headers received");

    let mut hasher = algorithm.hasher();
    let mut received = 0usize;
    while let Some(chunk) = response.chunk().await.map_err(FetchError::BodyStream)? {
        received += chunk.len();
        hasher.update(&chunk);
    }

    tracing::trace!(%url, bytes = received, "response body hashed");
    Ok(hasher.finalize())
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why not reqwest's own `timeout`?
//    - It would only cover the request; the scope also has to react to the
//      batch being cancelled, and to hand the callback a token it can watch
//    - One select over cancellation, deadline and the fetch covers all three
//
// 2. Dropping the fetch future
//    - reqwest aborts the connection when its response future or body is
//      dropped, so losing the race releases the socket immediately
//
// 3. Huge timeouts
//    - `Instant + Duration` panics on overflow; `deadline_after` clamps to a
//      far-future instant instead, which the timer treats as "never"
// -----------------------------------------------------------------------------
