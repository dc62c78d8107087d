//! MAC address extraction helpers
//!
//! Router status pages embed client MACs either hyphen-delimited
//! (`AA-BB-CC-DD-EE-FF`, legacy HTML and JSON APIs) or colon-delimited
//! (`AA:BB:CC:DD:EE:FF`, the proprietary `cgi` text protocol).
//! Canonical form is colon-delimited uppercase hex.
//!
//! Only uppercase hex is recognized, as the firmware renders it. Lowercase
//! runs in scraped pages are not treated as MACs.
//!
//! Extraction keeps duplicates and source order; deduplication happens when
//! results are collected into a [`crate::scanner::DeviceSet`].

use std::sync::OnceLock;

use regex::Regex;

fn hyphen_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[0-9A-F]{2}(?:-[0-9A-F]{2}){5}").expect("valid MAC pattern")
    })
}

fn colon_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[0-9A-F]{2}(?::[0-9A-F]{2}){5}").expect("valid MAC pattern")
    })
}

/// Normalize a MAC address to canonical form (e.g. "aa-bb-cc-dd-ee-ff" → "AA:BB:CC:DD:EE:FF")
pub fn normalize_mac(mac: &str) -> String {
    mac.trim().replace('-', ":").to_uppercase()
}

/// Find every hyphen-delimited MAC in `text`, normalized to canonical form
pub fn extract_hyphenated(text: &str) -> Vec<String> {
    hyphen_pattern()
        .find_iter(text)
        .map(|m| normalize_mac(m.as_str()))
        .collect()
}

/// Find every colon-delimited MAC in `text`, normalized to canonical form
pub fn extract_colon(text: &str) -> Vec<String> {
    colon_pattern()
        .find_iter(text)
        .map(|m| normalize_mac(m.as_str()))
        .collect()
}
