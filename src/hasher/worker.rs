// src/hasher/worker.rs
// =============================================================================
// Worker and drainer tasks.
//
// A worker loops: take one URL off the rendezvous channel, run the fetch
// pipeline, hand the outcome to the callback, repeat. It stops when the
// channel closes or the batch is cancelled.
//
// The drainer sleeps until the batch is cancelled, then swallows whatever
// the dispatcher still pushes into the channel so the dispatcher's send
// can never hang once the workers have left.
// =============================================================================

use super::channel::Receiver;
use super::fetch::{fetch_digest, FetchScope};
use super::Sink;
use crate::digest::Algorithm;
use futures::FutureExt;
use reqwest::Client;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Everything a worker needs, shared by the whole pool for one batch
pub(crate) struct Shared {
    pub(crate) client: Client,
    pub(crate) algorithm: Algorithm,
    pub(crate) fetch_timeout: Duration,
    pub(crate) sink: Sink,
}

pub(crate) async fn worker_loop(
    worker_id: usize,
    token: CancellationToken,
    urls: Receiver<String>,
    shared: std::sync::Arc<Shared>,
) {
    tracing::debug!(worker = worker_id, "worker started");

    loop {
        // Both branches are cancel safe: losing the race to `cancelled()`
        // drops the recv future before it dequeues anything, so no URL is
        // taken (and acked) without being processed
        let url = tokio::select! {
            _ = token.cancelled() => break,
            next = urls.recv() => match next {
                Some(url) => url,
                None => break,
            },
        };

        // The URL is already acked; a panic here must not cost a worker
        contain_panic(worker_id, process_url(worker_id, &token, &shared, url)).await;
    }

    tracing::debug!(worker = worker_id, "worker stopped");
}

async fn process_url(worker_id: usize, token: &CancellationToken, shared: &Shared, url: String) {
    let scope = FetchScope::new(token.child_token(), shared.fetch_timeout);
    // Whatever happens below, the scope is cancelled when we leave
    let _release = scope.token().clone().drop_guard();

    let result = scope
        .run(fetch_digest(&shared.client, &url, shared.algorithm))
        .await;

    match &result {
        Ok(digest) => tracing::debug!(worker = worker_id, %url, %digest, "url hashed"),
        Err(e) => tracing::debug!(worker = worker_id, %url, error = %e, "url failed"),
    }

    // A panicking callback must not take the worker down with it
    let delivered = panic::catch_unwind(AssertUnwindSafe(|| (shared.sink)(&scope, &url, result)));
    if let Err(payload) = delivered {
        tracing::error!(
            worker = worker_id,
            %url,
            panic = panic_message(payload.as_ref()),
            "completion callback panicked"
        );
    }
}

/// Runs one pipeline, logging instead of unwinding if it panics.
///
/// Returns `false` when the pipeline panicked.
async fn contain_panic<F>(worker_id: usize, pipeline: F) -> bool
where
    F: Future<Output = ()>,
{
    match AssertUnwindSafe(pipeline).catch_unwind().await {
        Ok(()) => true,
        Err(payload) => {
            tracing::error!(
                worker = worker_id,
                panic = panic_message(payload.as_ref()),
                "fetch pipeline panicked"
            );
            false
        }
    }
}

pub(crate) async fn drain_on_cancel(token: CancellationToken, urls: Receiver<String>) {
    token.cancelled().await;

    // Runs until the dispatcher drops its sender
    let mut dropped = 0usize;
    while let Some(url) = urls.recv().await {
        tracing::trace!(%url, "dropping url after cancellation");
        dropped += 1;
    }

    if dropped > 0 {
        tracing::debug!(dropped, "drained pending urls");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why does the drainer exist?
//    - The dispatcher checks the token before each send, but a send that is
//      already waiting cannot see the cancellation
//    - Once cancelled, the workers leave their loops and nobody would ever
//      take that URL; the drainer takes it instead, so the send returns and
//      the dispatcher notices the cancelled token on its next iteration
//    - Drained URLs get no callback: they never reached a worker
//
// 2. Panic policy
//    - Callback panics are caught around the call itself, logged with the
//      URL, and the worker moves on to its next URL
//    - Any other panic in the pipeline is caught around the whole of
//      `process_url`. That URL gets no callback, but the worker survives,
//      so the pool never shrinks and the dispatcher never waits on a
//      worker that is gone
//    - `AssertUnwindSafe` is fine here: after a panic nothing but the
//      shared, immutable `Shared` survives, and the per-URL scope is
//      cancelled by its drop guard during unwinding
// -----------------------------------------------------------------------------
