// tests/normalize_idempotence.rs
//
// Normalization keys must be stable: applying them twice changes nothing.

use digest_curator::normalize::{content_hash, normalize_title, normalize_url, title_key};

const URLS: &[&str] = &[
    "https://x.com/a?utm_source=y",
    "http://WWW.X.com/a/",
    "https://x.com/a#section",
    "https://user:pw@x.com:8443/Deep/Path/?q=1",
    "https://www.www.example.com/",
    "ftp://files.example.com/pub/",
    "x.com/a",
    "  ",
    "not a url at all",
    "https://例え.jp/パス",
];

const TITLES: &[&str] = &[
    "BREAKING: Big news | Reuters",
    "Update: Breaking: double prefix",
    "Exclusive:   spaced   out   • The Verge",
    "Why?? Because!!!",
    "A | B · C • D",
    "&lt;b&gt;markup&lt;/b&gt; in title",
    "report:",
    "",
];

#[test]
fn url_normalization_is_idempotent() {
    for u in URLS {
        let once = normalize_url(u);
        assert_eq!(normalize_url(&once), once, "input {u:?}");
    }
}

#[test]
fn title_normalization_is_idempotent() {
    for t in TITLES {
        let once = normalize_title(t);
        assert_eq!(normalize_title(&once), once, "input {t:?}");
    }
}

#[test]
fn deeply_stacked_prefixes_normalize_in_one_call() {
    let stacked = format!("{}story", "breaking: ".repeat(20));
    let once = normalize_title(&stacked);
    assert_eq!(once, "story");
    assert_eq!(normalize_title(&once), once);

    let mixed = format!("{}Deal closes{}", "Update: News: ".repeat(12), " | Wire".repeat(12));
    let once = normalize_title(&mixed);
    assert_eq!(once, "deal closes");
    assert_eq!(normalize_title(&once), once);
}

#[test]
fn query_and_fragment_are_ignored() {
    let base = normalize_url("https://x.com/a");
    assert_eq!(normalize_url("https://x.com/a?utm_source=y"), base);
    assert_eq!(normalize_url("http://www.x.com/a/#top"), base);
}

#[test]
fn title_key_is_stable_under_normalization() {
    for t in TITLES {
        let n = normalize_title(t);
        assert_eq!(title_key(&normalize_title(&n)), title_key(&n));
    }
}

#[test]
fn hash_folds_punctuation_only() {
    assert_eq!(content_hash("AI, chips & policy."), content_hash("ai chips  policy"));
    assert_ne!(content_hash("ai chips"), content_hash("ai chip"));
}
