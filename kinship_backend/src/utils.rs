//! Shared helpers and constants.

use chrono::Utc;
use regex::Regex;
use std::sync::OnceLock;

pub const APP_NAME: &str = "kinship_backend";

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339()
}

pub fn print_banner() {
    println!("{} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));
}

/// Loose shape check for submitted image URLs. Accepts http(s) URLs and
/// server-relative paths; everything else is rejected before it reaches
/// storage.
pub fn looks_like_url(value: &str) -> bool {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    let re = URL_RE
        .get_or_init(|| Regex::new(r"^(https?://[^\s]+|/[^\s]*)$").expect("static url pattern"));
    re.is_match(value.trim())
}
