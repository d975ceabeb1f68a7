//! Shared helpers for the integration tests.
//!
//! - `Recorder` collects callback outcomes so assertions run on the test
//!   task (a panic inside the callback would only be logged by the engine)
//! - Raw TCP servers for endpoints wiremock cannot imitate: bodies shorter
//!   than their Content-Length, requests that never get an answer, and
//!   handlers that count how many requests are being served at once

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use url_hasher::{Digest, FailureKind, FetchError, FetchScope};

pub const SAMPLE_PAYLOAD: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
pub const SAMPLE_PAYLOAD_MD5: &str = "6330d6a09e56387e4dd59502418fa642";

/// One callback invocation
#[derive(Debug, Clone)]
pub struct Record {
    pub url: String,
    pub digest: Option<String>,
    pub failure: Option<FailureKind>,
    pub error: Option<String>,
    pub scope_cancelled: bool,
}

impl Record {
    pub fn is_success(&self) -> bool {
        self.digest.is_some()
    }
}

#[derive(Clone, Default)]
pub struct Recorder {
    records: Arc<Mutex<Vec<Record>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(
        &self,
    ) -> impl Fn(&FetchScope, &str, Result<Digest, FetchError>) + Send + Sync + 'static {
        let recorder = self.clone();
        move |scope: &FetchScope, url: &str, result: Result<Digest, FetchError>| {
            recorder.record(scope, url, result);
        }
    }

    pub fn record(&self, scope: &FetchScope, url: &str, result: Result<Digest, FetchError>) {
        self.records
            .lock()
            .unwrap()
            .push(to_record(scope, url, result));
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

pub fn to_record(scope: &FetchScope, url: &str, result: Result<Digest, FetchError>) -> Record {
    let scope_cancelled = scope.is_cancelled();
    match result {
        Ok(digest) => Record {
            url: url.to_string(),
            digest: Some(digest.to_hex()),
            failure: None,
            error: None,
            scope_cancelled,
        },
        Err(e) => Record {
            url: url.to_string(),
            digest: None,
            failure: Some(e.kind()),
            error: Some(e.to_string()),
            scope_cancelled,
        },
    }
}

/// A bare HTTP/1.1 server driven by a per-connection handler
pub struct RawServer {
    pub url: String,
    accept_loop: JoinHandle<()>,
}

impl Drop for RawServer {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

pub async fn spawn_raw_server<F, Fut>(handler: F) -> RawServer
where
    F: Fn(TcpStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    let accept_loop = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move { handler(stream).await });
        }
    });

    RawServer {
        url: format!("http://{}", addr),
        accept_loop,
    }
}

/// Reads up to the end of the request headers
pub async fn read_request_head(stream: &mut TcpStream) {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
}

pub async fn write_response(stream: &mut TcpStream, content_length: usize, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        content_length
    );
    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.write_all(body).await;
    let _ = stream.flush().await;
}

/// Announces 42 more bytes than it sends, then hangs up
pub async fn spawn_short_body_server() -> RawServer {
    spawn_raw_server(|mut stream| async move {
        read_request_head(&mut stream).await;
        let body = format!("{}\n", SAMPLE_PAYLOAD);
        write_response(&mut stream, body.len() + 42, body.as_bytes()).await;
        let _ = stream.shutdown().await;
    })
    .await
}

/// Accepts requests and never answers them
pub async fn spawn_hanging_server() -> RawServer {
    spawn_raw_server(|mut stream| async move {
        read_request_head(&mut stream).await;
        std::future::pending::<()>().await;
        drop(stream);
    })
    .await
}

/// Tracks how many requests are being served at the same time
#[derive(Clone, Default)]
pub struct ConcurrencyGauge {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    served: Arc<AtomicUsize>,
}

impl ConcurrencyGauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }
}

/// Holds every request for `hold` before answering
pub async fn spawn_gauged_server(gauge: ConcurrencyGauge, hold: Duration) -> RawServer {
    spawn_raw_server(move |mut stream| {
        let gauge = gauge.clone();
        async move {
            read_request_head(&mut stream).await;

            let now = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
            gauge.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(hold).await;
            // Leave the gauge before answering: the client counts the
            // request as in flight until the body has been read
            gauge.current.fetch_sub(1, Ordering::SeqCst);
            gauge.served.fetch_add(1, Ordering::SeqCst);

            write_response(&mut stream, 5, b"hello").await;
        }
    })
    .await
}

/// An address nothing listens on
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn md5_hex(body: &[u8]) -> String {
    format!("{:x}", md5::compute(body))
}
