// src/normalize.rs
//! Comparison keys: canonical URLs, canonical titles, content hashes and coarse title keys.
//!
//! These are best-effort keys, not validators. Nothing here fails: unparsable input
//! degrades to a lowercased, trimmed copy of itself. Every function is idempotent.

use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

/// Editorial prefixes dropped from the front of a title (checked after lowercasing).
pub const TITLE_PREFIXES: &[&str] = &["breaking:", "news:", "update:", "exclusive:", "report:"];

/// Words ignored when building a grouping key.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did", "will",
    "would", "could", "should", "may", "might", "can", "shall", "must",
];

const TITLE_KEY_WORDS: usize = 5;

fn re_source_suffix() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s*[|•·]\s*[^|•·]*$").unwrap())
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn re_non_word() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").unwrap())
}

fn re_bangs() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"!{2,}").unwrap())
}

fn re_questions() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\?{2,}").unwrap())
}

/// Canonical URL key: `host[:port]/path`, lowercased, no `www.`, no trailing slash.
///
/// Scheme, userinfo, query string and fragment are dropped, so `http://` vs `https://`
/// and tracking parameters never make two links look different.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let parsed = match Url::parse(trimmed) {
        Ok(u) => u,
        Err(_) => return trimmed.to_lowercase(),
    };
    let Some(host) = parsed.host_str() else {
        return trimmed.to_lowercase();
    };

    let host = host.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let mut out = String::with_capacity(trimmed.len());
    out.push_str(host);
    if let Some(port) = parsed.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }
    out.push_str(&parsed.path().trim_end_matches('/').to_lowercase());
    out
}

/// Canonical title for similarity comparison.
///
/// Lowercases, decodes entities, strips editorial prefixes and a trailing
/// `| Source Name` segment, squashes repeated `!`/`?`, collapses whitespace.
/// The steps are repeated until nothing changes.
pub fn normalize_title(title: &str) -> String {
    // After the first pass every change shortens the title, so this terminates.
    let mut current = normalize_title_once(title);
    loop {
        let next = normalize_title_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_title_once(title: &str) -> String {
    let decoded = html_escape::decode_html_entities(title);
    let mut out = decoded.to_lowercase().trim().to_string();

    while let Some(rest) = TITLE_PREFIXES
        .iter()
        .find_map(|prefix| out.strip_prefix(prefix))
    {
        out = rest.trim().to_string();
    }

    // Never strip the whole title away.
    loop {
        let stripped = re_source_suffix().replace(&out, "");
        if stripped.trim().is_empty() || stripped == out {
            break;
        }
        out = stripped.into_owned();
    }

    out = re_bangs().replace_all(&out, "!").into_owned();
    out = re_questions().replace_all(&out, "?").into_owned();
    re_ws().replace_all(&out, " ").trim().to_string()
}

/// Text folded for hashing: lowercase, word characters and single spaces only.
pub fn fold_for_hash(text: &str) -> String {
    let lowered = text.to_lowercase();
    let no_punct = re_non_word().replace_all(&lowered, "");
    re_ws().replace_all(&no_punct, " ").trim().to_string()
}

/// SHA-256 (hex) of the folded text. Used for exact-duplicate bucketing only.
pub fn content_hash(text: &str) -> String {
    let folded = fold_for_hash(text);
    let digest = Sha256::digest(folded.as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Coarse grouping key from an already normalized title: first five meaningful words.
///
/// Words are stripped of punctuation; stop-words, numbers and words of two
/// characters or fewer are skipped.
pub fn title_key(normalized_title: &str) -> String {
    normalized_title
        .split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| {
            w.chars().count() > 2
                && !STOP_WORDS.contains(&w.as_str())
                && !w.chars().all(|c| c.is_ascii_digit())
        })
        .take(TITLE_KEY_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}
