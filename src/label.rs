//! Short source labels derived from feed URLs.

use std::sync::OnceLock;

use regex::Regex;

static SUBREDDIT: OnceLock<Regex> = OnceLock::new();
static DOMAIN: OnceLock<Regex> = OnceLock::new();

fn subreddit_pattern() -> &'static Regex {
    SUBREDDIT.get_or_init(|| {
        Regex::new(r"^[\w\d]+://[\w\d]+\.reddit\.com/r/(.+)/.rss$")
            .expect("subreddit pattern is valid")
    })
}

fn domain_pattern() -> &'static Regex {
    DOMAIN.get_or_init(|| {
        Regex::new(r"^[\w\d]+://([\w\d]+\.)+([\w\d]+\.)[\w\d]+")
            .expect("domain pattern is valid")
    })
}

/// Derive the display label for a feed URL.
///
/// Reddit feeds become `/r/<name>`, anything else with a subdomain becomes the
/// label in front of the TLD (`news.example.com` -> `example`). Otherwise the
/// label is empty.
pub fn derive_label(url: &str) -> String {
    if let Some(caps) = subreddit_pattern().captures(url) {
        return caps
            .get(1)
            .map(|name| format!("/r/{}", name.as_str()))
            .unwrap_or_default();
    }

    if let Some(caps) = domain_pattern().captures(url) {
        return caps
            .get(2)
            .map(|site| site.as_str().trim_end_matches('.').to_string())
            .unwrap_or_default();
    }

    String::new()
}
