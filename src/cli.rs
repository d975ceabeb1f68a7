// src/cli.rs
// =============================================================================
// Command-line interface, defined with clap's derive API.
//
// Usage:
//   url-hasher [--parallel N] [--timeout SECS] [--algorithm md5|sha256]
//              [--json] [--log-level LEVEL] [URL]...
//
// Arguments without a scheme ("example.com") are fetched over plain http.
// =============================================================================

use clap::Parser;
use url::Url;
use url_hasher::{Algorithm, DEFAULT_PARALLEL};

#[derive(Parser, Debug)]
#[command(
    name = "url-hasher",
    version,
    about = "Fetch URLs concurrently and print a digest of each response body",
    long_about = "url-hasher fetches every URL given on the command line, at most --parallel at a time, \
                  and prints one '<url> <hex digest>' line per successful fetch. \
                  Failures are reported on stderr."
)]
pub struct Cli {
    /// Maximum number of parallel workers (at least 1)
    // Signed so zero and negative values reach our own check and print usage
    #[arg(long, default_value_t = DEFAULT_PARALLEL as i64, allow_negative_numbers = true)]
    pub parallel: i64,

    /// Per-URL timeout in seconds (0 uses the default of 60)
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    pub timeout: u64,

    /// Digest algorithm: md5 or sha256
    #[arg(long, default_value_t = Algorithm::Md5)]
    pub algorithm: Algorithm,

    /// Print one JSON object per line instead of plain text
    #[arg(long)]
    pub json: bool,

    /// Log filter for diagnostics on stderr (e.g. "debug", "url_hasher=trace")
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// URLs to fetch
    pub urls: Vec<String>,
}

impl Cli {
    /// The pool size, if it is valid
    pub fn parallel(&self) -> Option<usize> {
        usize::try_from(self.parallel).ok().filter(|&n| n >= 1)
    }
}

/// Parses every argument into a URL, defaulting the scheme to http.
///
/// Arguments that do not parse are skipped with a warning.
pub fn normalize_urls(args: &[String]) -> Vec<String> {
    args.iter()
        .filter_map(|arg| match normalize_url(arg) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                tracing::warn!(url = %arg, error = %e, "skipping invalid url");
                None
            }
        })
        .collect()
}

fn normalize_url(raw: &str) -> Result<Url, url::ParseError> {
    let raw = raw.trim();
    if has_scheme(raw) {
        Url::parse(raw)
    } else {
        Url::parse(&format!("http://{}", raw))
    }
}

// True when the text before the first "://" is a scheme name
// (ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )), so a "://" inside a query
// string does not count
fn has_scheme(raw: &str) -> bool {
    let Some((scheme, _)) = raw.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
