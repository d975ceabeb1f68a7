// src/main.rs
// =============================================================================
// Entry point of the url-hasher command.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Normalize the positional arguments into URLs
// 3. Run the engine, printing each outcome as soon as it arrives
// 4. Exit with 0 on completion or clean cancellation, 1 on failure
//
// SIGINT / SIGTERM cancel the batch: fetches in flight are aborted and URLs
// not yet dispatched are dropped.
// =============================================================================

mod cli;
mod output;
mod signal;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use cli::Cli;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url_hasher::{CancellationToken, Hasher};

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version land here too, and are not failures
            let code = if e.use_stderr() { 1 } else { 0 };
            e.print()?;
            return Ok(code);
        }
    };

    let Some(parallel) = cli.parallel() else {
        eprintln!("{}", Cli::command().render_help());
        return Ok(1);
    };

    init_logging(&cli.log_level)?;

    let urls = cli::normalize_urls(&cli.urls);
    tracing::debug!(count = urls.len(), parallel, "starting batch");

    let printer = output::Printer::new(cli.json);
    let hasher = Hasher::builder()
        .parallel(parallel)
        .fetch_timeout(Duration::from_secs(cli.timeout))
        .algorithm(cli.algorithm)
        .on_done(move |_scope, url, result| printer.report(url, &result))
        .build()?;

    let token = CancellationToken::new();
    let signals = tokio::spawn(signal::cancel_on_signal(token.clone()));

    let termination = hasher.start(&token, urls).await;

    signals.abort();

    if termination.is_cancelled() {
        tracing::info!("batch cancelled before all urls were processed");
    }

    Ok(0)
}

// The filter comes from --log-level only; the environment is not consulted
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why is a cancelled run exit code 0?
//    - Ctrl+C is a request, not a failure: every URL that finished was
//      printed, the rest were deliberately dropped
//    - Exit code 1 is kept for runs that could not start at all
//
// 2. Why spawn the signal bridge instead of awaiting it?
//    - `start` has to run at the same time; the bridge only flips the token
//    - It is aborted once the batch is over so the process can exit
// -----------------------------------------------------------------------------
