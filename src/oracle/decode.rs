// src/oracle/decode.rs
//! Lenient decoding of oracle replies.
//!
//! Replies are supposed to be a single JSON object but often arrive wrapped in code
//! fences or surrounded by prose. Decoding: strip fences, cut from the first `{` to the
//! last `}`, then deserialize into the expected shape. Any failure is a [`DecodeError`],
//! which callers treat as "use the fallback".

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("reply contains no JSON object")]
    NoObject,
    #[error("reply is missing a required field: {0}")]
    MissingField(String),
    #[error("reply is not valid for the expected shape: {0}")]
    Invalid(String),
}

/// Remove a leading ```` ``` ```` / ```` ```json ```` fence and a trailing fence, if present.
pub fn strip_code_fences(reply: &str) -> &str {
    let mut s = reply.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // Drop the info string (e.g. "json") up to the first newline.
        s = match rest.find('\n') {
            Some(nl) => &rest[nl + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
        s = s.trim_end();
        if let Some(body) = s.strip_suffix("```") {
            s = body;
        }
    }
    s.trim()
}

/// Outermost `{ ... }` span.
pub fn extract_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}

pub fn lenient_decode<T: DeserializeOwned>(reply: &str) -> Result<T, DecodeError> {
    let unfenced = strip_code_fences(reply);
    let object = extract_object(unfenced).ok_or(DecodeError::NoObject)?;
    serde_json::from_str::<T>(object).map_err(|e| {
        let msg = e.to_string();
        if msg.starts_with("missing field") {
            DecodeError::MissingField(msg)
        } else {
            DecodeError::Invalid(msg)
        }
    })
}
