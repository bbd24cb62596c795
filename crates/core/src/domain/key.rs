use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the SHA-256 digest of a question.
///
/// Keys travel through the messaging platform as button payloads, so the
/// algorithm and the truncation length are part of the wire format.
pub const QUESTION_KEY_LEN: usize = 16;

/// Short deterministic fingerprint of a question's text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionKey(String);

impl QuestionKey {
    pub fn from_question(text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let mut digest = format!("{:x}", hasher.finalize());
        digest.truncate(QUESTION_KEY_LEN);
        Self(digest)
    }

    /// Accepts an inbound payload only when it has the shape of a key.
    pub fn parse(payload: &str) -> Option<Self> {
        let well_formed = payload.len() == QUESTION_KEY_LEN
            && payload.bytes().all(|byte| matches!(byte, b'0'..=b'9' | b'a'..=b'f'));
        well_formed.then(|| Self(payload.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
