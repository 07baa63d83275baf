//! BLAKE3 content fingerprints.
//!
//! # Overview
//!
//! A [`Fingerprint`] is the 32-byte BLAKE3 digest of a file's full content.
//! It is a change-detection checksum: identical bytes always produce the same
//! fingerprint, and any byte difference produces a different one with
//! overwhelming probability.
//!
//! Fingerprints are persisted as 64 lowercase hexadecimal characters.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::CacheError;

/// Length of a fingerprint in bytes.
pub const FINGERPRINT_LEN: usize = 32;

/// A BLAKE3 digest of file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Fingerprint an in-memory buffer.
    ///
    /// Produces the same digest as [`Fingerprint::of_file`] on a file with
    /// identical content.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Fingerprint a file by streaming its full content through BLAKE3.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the file cannot be opened or read
    /// (missing, permission denied, removed mid-read).
    pub fn of_file(path: &Path) -> Result<Self, CacheError> {
        let io_err = |source: io::Error| CacheError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(io_err)?;
        let mut hasher = blake3::Hasher::new();
        io::copy(&mut file, &mut hasher).map_err(io_err)?;
        Ok(Self(*hasher.finalize().as_bytes()))
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Lowercase hexadecimal rendering (64 characters).
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Error returned when a string is not a valid fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFingerprintError {
    /// Wrong number of characters.
    #[error("expected {expected} hex characters, got {actual}")]
    Length {
        /// Required length
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },
    /// A character outside `[0-9a-fA-F]`.
    #[error("invalid hex character at position {0}")]
    InvalidChar(usize),
}

impl FromStr for Fingerprint {
    type Err = ParseFingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != FINGERPRINT_LEN * 2 {
            return Err(ParseFingerprintError::Length {
                expected: FINGERPRINT_LEN * 2,
                actual: bytes.len(),
            });
        }

        let mut out = [0u8; FINGERPRINT_LEN];
        for (i, pair) in bytes.chunks_exact(2).enumerate() {
            let hi = hex_value(pair[0]).ok_or(ParseFingerprintError::InvalidChar(i * 2))?;
            let lo = hex_value(pair[1]).ok_or(ParseFingerprintError::InvalidChar(i * 2 + 1))?;
            out[i] = (hi << 4) | lo;
        }
        Ok(Self(out))
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = ParseFingerprintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.to_hex()
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
