// src/digest.rs
// =============================================================================
// Digest algorithms used to fingerprint response bodies.
//
// Bodies are never held in memory as a whole: the fetcher feeds every chunk
// it receives into a BodyHasher and only the finished Digest survives.
// =============================================================================

use crate::error::Error;
use sha2::Digest as _;
use std::fmt;
use std::str::FromStr;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Algorithm {
    /// MD5, 16 byte digests
    #[default]
    Md5,
    /// SHA-256, 32 byte digests
    Sha256,
}

impl Algorithm {
    /// Digest length in bytes
    pub fn output_len(self) -> usize {
        match self {
            Algorithm::Md5 => 16,
            Algorithm::Sha256 => 32,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Md5 => "md5",
            Algorithm::Sha256 => "sha256",
        }
    }

    pub(crate) fn hasher(self) -> BodyHasher {
        match self {
            Algorithm::Md5 => BodyHasher::Md5(md5::Context::new()),
            Algorithm::Sha256 => BodyHasher::Sha256(sha2::Sha256::new()),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Algorithm::Md5),
            "sha256" => Ok(Algorithm::Sha256),
            _ => Err(Error::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Incremental accumulator for one response body
pub(crate) enum BodyHasher {
    Md5(md5::Context),
    Sha256(sha2::Sha256),
}

impl BodyHasher {
    pub(crate) fn update(&mut self, chunk: &[u8]) {
        match self {
            BodyHasher::Md5(ctx) => ctx.consume(chunk),
            BodyHasher::Sha256(hasher) => hasher.update(chunk),
        }
    }

    pub(crate) fn finalize(self) -> Digest {
        match self {
            // md5::Digest is a [u8; 16] newtype
            BodyHasher::Md5(ctx) => Digest(ctx.compute().0.to_vec()),
            BodyHasher::Sha256(hasher) => Digest(hasher.finalize().to_vec()),
        }
    }
}

/// Finished digest of a response body
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest(Vec<u8>);

impl Digest {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why an enum instead of a trait object?
//    - The set of algorithms is closed and small; a match per chunk is
//      cheaper than a vtable call and keeps BodyHasher Send without boxing
//
// 2. Why does Digest own a Vec?
//    - The two algorithms produce different lengths; `output_len` says which
// -----------------------------------------------------------------------------
