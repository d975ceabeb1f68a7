// src/output.rs
// =============================================================================
// Formats per-URL outcomes for the terminal.
//
// Text mode (default):
//   stdout: "<url> <hex digest>"
//   stderr: "Error, could not fetch url (<url>): <reason>"
//
// JSON mode (--json): one object per line, same streams.
//
// Lines are written by whichever worker finished the URL, so each line is
// emitted with a single locked write.
// =============================================================================

use serde::Serialize;
use std::io::Write;
use url_hasher::{Digest, FailureKind, FetchError};

/// One line of --json output
#[derive(Debug, Serialize)]
struct Record<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<FailureKind>,
}

#[derive(Debug, Clone, Copy)]
pub struct Printer {
    json: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn report(&self, url: &str, result: &Result<Digest, FetchError>) {
        let line = self.format(url, result);
        // A closed pipe is not worth crashing a worker over
        let _ = match result {
            Ok(_) => writeln!(std::io::stdout().lock(), "{}", line),
            Err(_) => writeln!(std::io::stderr().lock(), "{}", line),
        };
    }

    fn format(&self, url: &str, result: &Result<Digest, FetchError>) -> String {
        if !self.json {
            return match result {
                Ok(digest) => format!("{} {}", url, digest),
                Err(e) => format!("Error, could not fetch url ({}): {}", url, e),
            };
        }

        let record = match result {
            Ok(digest) => Record {
                url,
                digest: Some(digest.to_hex()),
                error: None,
                kind: None,
            },
            Err(e) => Record {
                url,
                digest: None,
                error: Some(e.to_string()),
                kind: Some(e.kind()),
            },
        };
        // Serializing plain strings and a unit enum cannot fail
        serde_json::to_string(&record).unwrap_or_default()
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why lock stdout for every line?
//    - Several workers report at once; `writeln!` on an unlocked handle may
//      interleave the pieces of two lines
// -----------------------------------------------------------------------------
