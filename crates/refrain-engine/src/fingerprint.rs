// SPDX-License-Identifier: GPL-3.0-or-later

use crate::{EngineError, Result};

/// Duration covered by one Chromaprint sub-fingerprint, in seconds.
pub const ITEM_DURATION_SECS: f32 = 0.1238;

/// Audio fingerprint (Chromaprint).
///
/// `hash` is the compressed, base64-encoded form Chromaprint emits; `raw` holds the
/// sub-fingerprints used for alignment during recognition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub hash: String,
    pub raw: Vec<u32>,
    /// Seconds of audio the fingerprint was computed from.
    pub duration: u32,
}

impl Fingerprint {
    pub fn new(hash: impl Into<String>, raw: Vec<u32>, duration: u32) -> Self {
        Self {
            hash: hash.into(),
            raw,
            duration,
        }
    }

    /// Validate the fingerprint before it is stored or matched.
    pub fn validate(&self) -> Result<()> {
        if self.hash.is_empty() {
            return Err(EngineError::InvalidFingerprint(
                "fingerprint hash is empty".to_string(),
            ));
        }

        if self.raw.is_empty() {
            return Err(EngineError::InvalidFingerprint(
                "no sub-fingerprints".to_string(),
            ));
        }

        let trimmed = self.hash.trim_end_matches('=');
        if self.hash.len() - trimmed.len() > 2 {
            return Err(EngineError::InvalidFingerprint(
                "invalid base64 padding: too many '=' characters".to_string(),
            ));
        }

        if trimmed.contains('=') {
            return Err(EngineError::InvalidFingerprint(
                "padding character '=' must only appear at the end".to_string(),
            ));
        }

        // Chromaprint encodes with the URL-safe alphabet; accept the standard one too.
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '-' | '_'))
        {
            return Err(EngineError::InvalidFingerprint(
                "fingerprint contains invalid characters".to_string(),
            ));
        }

        Ok(())
    }
}
