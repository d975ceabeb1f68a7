// src/hasher/mod.rs
// =============================================================================
// The bounded-concurrency fetch-and-hash engine.
//
// How a batch runs:
// 1. `start` derives an internal cancellation token from the caller's
// 2. It spawns a drainer and `parallel` workers sharing one rendezvous
//    channel
// 3. URLs are pushed into the channel one at a time; each send returns only
//    once a worker (or, after cancellation, the drainer) has taken the URL
// 4. The channel is closed, the workers are joined, the drainer is stopped
//
// Submodules:
// - channel: the rendezvous channel
// - fetch: the per-URL scope and HTTP + hashing pipeline
// - worker: worker and drainer loops
// =============================================================================

mod channel;
mod fetch;
mod worker;

pub use fetch::FetchScope;

use crate::digest::{Algorithm, Digest};
use crate::error::{Error, FetchError, Result};
use futures::future::join_all;
use reqwest::Client;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use worker::Shared;

/// Per-URL timeout used when none (or zero) is configured
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Default size of the worker pool
pub const DEFAULT_PARALLEL: usize = 10;

pub(crate) type Sink =
    Arc<dyn Fn(&FetchScope, &str, std::result::Result<Digest, FetchError>) + Send + Sync>;

/// How a call to [`Hasher::start`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every URL was dispatched and processed
    Completed,
    /// The caller's scope was cancelled before the batch finished
    Cancelled,
}

impl Termination {
    pub fn is_cancelled(self) -> bool {
        self == Termination::Cancelled
    }
}

/// Outcome of one URL, as gathered by [`Hasher::collect`]
#[derive(Debug)]
pub struct FetchOutcome {
    pub url: String,
    pub result: std::result::Result<Digest, FetchError>,
}

/// Engine settings, fixed for the lifetime of a [`Hasher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasherConfig {
    /// Maximum number of URLs fetched at the same time
    pub parallel: usize,
    /// Per-URL timeout; zero means [`DEFAULT_FETCH_TIMEOUT`]
    pub fetch_timeout: Duration,
    pub algorithm: Algorithm,
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            parallel: DEFAULT_PARALLEL,
            fetch_timeout: Duration::ZERO,
            algorithm: Algorithm::default(),
        }
    }
}

impl HasherConfig {
    /// The timeout each batch actually runs with
    pub fn effective_fetch_timeout(&self) -> Duration {
        if self.fetch_timeout.is_zero() {
            DEFAULT_FETCH_TIMEOUT
        } else {
            self.fetch_timeout
        }
    }
}

/// Fetches batches of URLs and reports the digest of every response body.
///
/// A `Hasher` can run any number of batches, one after another or at the
/// same time; nothing is carried over between them except the HTTP
/// client's idle connections.
///
/// ```no_run
/// use url_hasher::{CancellationToken, Hasher};
///
/// # async fn demo() -> url_hasher::Result<()> {
/// let hasher = Hasher::builder()
///     .parallel(4)
///     .on_done(|_scope, url, result| match result {
///         Ok(digest) => println!("{url} {digest}"),
///         Err(e) => eprintln!("{url}: {e}"),
///     })
///     .build()?;
///
/// hasher
///     .start(&CancellationToken::new(), ["https://www.rust-lang.org"])
///     .await;
/// # Ok(())
/// # }
/// ```
pub struct Hasher {
    config: HasherConfig,
    client: Client,
    on_done: Sink,
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hasher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Hasher {
    pub fn builder() -> HasherBuilder {
        HasherBuilder::default()
    }

    pub fn config(&self) -> &HasherConfig {
        &self.config
    }

    /// Fetches and hashes every URL in `urls`, calling the configured
    /// callback once per URL that reached a worker.
    ///
    /// Returns once every worker has stopped; no callback runs after that.
    /// If `scope` is cancelled the remaining URLs are dropped without a
    /// callback and in-flight fetches finish with [`FetchError::Cancelled`].
    pub async fn start<I, S>(&self, scope: &CancellationToken, urls: I) -> Termination
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dispatch(scope, urls, Arc::clone(&self.on_done)).await
    }

    /// Like [`Hasher::start`], but gathers the outcomes instead of passing
    /// them to the configured callback. Outcomes are in completion order.
    pub async fn collect<I, S>(
        &self,
        scope: &CancellationToken,
        urls: I,
    ) -> (Termination, Vec<FetchOutcome>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let outcomes = Arc::new(Mutex::new(Vec::new()));

        let gathered = Arc::clone(&outcomes);
        let sink: Sink = Arc::new(
            move |_scope: &FetchScope, url: &str, result: std::result::Result<Digest, FetchError>| {
                let outcome = FetchOutcome {
                    url: url.to_string(),
                    result,
                };
                gathered
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(outcome);
            },
        );

        let termination = self.dispatch(scope, urls, sink).await;

        // Every worker, and with it every clone of the sink, is gone by now
        let outcomes = match Arc::try_unwrap(outcomes) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()),
            Err(shared) => std::mem::take(
                &mut *shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
            ),
        };
        (termination, outcomes)
    }

    async fn dispatch<I, S>(&self, scope: &CancellationToken, urls: I, sink: Sink) -> Termination
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let token = scope.child_token();
        // Dropping this future mid-batch still stops the pool
        let stop_pool = token.clone().drop_guard();

        let shared = Arc::new(Shared {
            client: self.client.clone(),
            algorithm: self.config.algorithm,
            fetch_timeout: self.config.effective_fetch_timeout(),
            sink,
        });

        let (tx, rx) = channel::rendezvous::<String>();

        let drainer = tokio::spawn(worker::drain_on_cancel(token.clone(), rx.clone()));

        let workers: Vec<_> = (0..self.config.parallel)
            .map(|worker_id| {
                tokio::spawn(worker::worker_loop(
                    worker_id,
                    token.clone(),
                    rx.clone(),
                    Arc::clone(&shared),
                ))
            })
            .collect();
        drop(rx);

        let mut dispatched = 0usize;
        for url in urls {
            if token.is_cancelled() {
                break;
            }
            // The drainer keeps a receiver alive, so this only fails if it died
            if tx.send(url.into()).await.is_err() {
                tracing::warn!("url channel closed early, stopping dispatch");
                break;
            }
            dispatched += 1;
        }
        drop(tx);

        for joined in join_all(workers).await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "worker task failed");
            }
        }

        let termination = if token.is_cancelled() {
            Termination::Cancelled
        } else {
            Termination::Completed
        };

        drop(stop_pool);
        if let Err(e) = drainer.await {
            tracing::error!(error = %e, "drainer task failed");
        }

        tracing::debug!(dispatched, ?termination, "batch finished");
        termination
    }
}

/// Builder for [`Hasher`]
#[derive(Default)]
pub struct HasherBuilder {
    config: HasherConfig,
    client: Option<Client>,
    on_done: Option<Sink>,
}

impl HasherBuilder {
    /// Maximum number of concurrent fetches, must be at least 1
    pub fn parallel(mut self, parallel: usize) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Per-URL timeout; `Duration::ZERO` selects [`DEFAULT_FETCH_TIMEOUT`]
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.config.algorithm = algorithm;
        self
    }

    pub fn config(mut self, config: HasherConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an existing client (and its connection pool) instead of a new one
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Callback receiving every per-URL outcome.
    ///
    /// It is called from worker tasks, possibly for several URLs at once,
    /// so any state it touches needs its own synchronization. A panic
    /// inside it is logged and swallowed.
    pub fn on_done<F>(mut self, on_done: F) -> Self
    where
        F: Fn(&FetchScope, &str, std::result::Result<Digest, FetchError>) + Send + Sync + 'static,
    {
        self.on_done = Some(Arc::new(on_done));
        self
    }

    pub fn build(self) -> Result<Hasher> {
        if self.config.parallel == 0 {
            return Err(Error::InvalidParallel(self.config.parallel));
        }
        let on_done = self.on_done.ok_or(Error::MissingCallback)?;

        let client = match self.client {
            Some(client) => client,
            None => Client::builder().build().map_err(Error::ClientBuild)?,
        };

        Ok(Hasher {
            config: self.config,
            client,
            on_done,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &FetchScope, _: &str, _: std::result::Result<Digest, FetchError>) {}

    #[test]
    fn test_zero_timeout_means_default() {
        let config = HasherConfig::default();
        assert_eq!(config.effective_fetch_timeout(), DEFAULT_FETCH_TIMEOUT);

        let config = HasherConfig {
            fetch_timeout: Duration::from_millis(200),
            ..HasherConfig::default()
        };
        assert_eq!(config.effective_fetch_timeout(), Duration::from_millis(200));
    }

    #[test]
    fn test_build_rejects_zero_parallel() {
        let err = Hasher::builder().parallel(0).on_done(noop).build().unwrap_err();
        assert!(matches!(err, Error::InvalidParallel(0)));
    }

    #[test]
    fn test_build_requires_callback() {
        let err = Hasher::builder().build().unwrap_err();
        assert!(matches!(err, Error::MissingCallback));
    }

    #[test]
    fn test_build_keeps_config_unchanged() {
        let hasher = Hasher::builder()
            .parallel(3)
            .algorithm(Algorithm::Sha256)
            .on_done(noop)
            .build()
            .unwrap();
        assert_eq!(hasher.config().parallel, 3);
        assert_eq!(hasher.config().fetch_timeout, Duration::ZERO);
        assert_eq!(hasher.config().algorithm, Algorithm::Sha256);
    }

    #[test]
    fn test_builder_accepts_whole_config() {
        let config = HasherConfig {
            parallel: 7,
            fetch_timeout: Duration::from_secs(3),
            algorithm: Algorithm::Sha256,
        };
        let hasher = Hasher::builder()
            .config(config.clone())
            .on_done(noop)
            .build()
            .unwrap();
        assert_eq!(hasher.config(), &config);

        let err = Hasher::builder()
            .config(HasherConfig {
                parallel: 0,
                ..config
            })
            .on_done(noop)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParallel(0)));
    }

    #[tokio::test]
    async fn test_empty_batch_completes_without_callbacks() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let hasher = Hasher::builder()
            .parallel(4)
            .on_done(move |_, _, _| {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            })
            .build()
            .unwrap();

        let termination = hasher
            .start(&CancellationToken::new(), Vec::<String>::new())
            .await;
        assert_eq!(termination, Termination::Completed);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_scope_dispatches_nothing() {
        let hasher = Hasher::builder().parallel(2).on_done(noop).build().unwrap();
        let scope = CancellationToken::new();
        scope.cancel();

        let (termination, outcomes) = hasher
            .collect(&scope, ["http://127.0.0.1:9/a", "http://127.0.0.1:9/b"])
            .await;
        assert!(termination.is_cancelled());
        assert!(outcomes.is_empty());
    }
}
