//! Change fingerprint over the volatile news subset

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 (hex) of the leading characters of the news text
///
/// Only detects change; equal fingerprints mean "treat as unchanged".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint the first `window` characters of `news_text`
    ///
    /// An empty text (no news available) hashes the empty string.
    pub fn of_text(news_text: &str, window: usize) -> Self {
        let end = news_text
            .char_indices()
            .nth(window)
            .map_or(news_text.len(), |(idx, _)| idx);
        Self(hex::encode(Sha256::digest(&news_text.as_bytes()[..end])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
