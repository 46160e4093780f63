//! Client signal extraction from the user agent and referer headers
//!
//! Browser and OS detection use ordered rule tables: the first rule whose
//! predicate matches the lowercased user agent wins. Several browsers embed
//! another browser's token (Edge and Opera both carry "chrome", Chrome
//! carries "safari"), so the order of the tables is significant.

use url::Url;

use super::models::ClientSignals;

type Rule = (fn(&str) -> bool, &'static str);

const BROWSER_RULES: &[Rule] = &[
    (
        |ua| ua.contains("chrome") && !ua.contains("edg") && !ua.contains("opr"),
        "Chrome",
    ),
    (|ua| ua.contains("firefox"), "Firefox"),
    (|ua| ua.contains("safari") && !ua.contains("chrome"), "Safari"),
    (|ua| ua.contains("edg"), "Edge"),
    (|ua| ua.contains("opr") || ua.contains("opera"), "Opera"),
    (
        |ua| ua.contains("trident") || ua.contains("msie"),
        "Internet Explorer",
    ),
];

const OS_RULES: &[Rule] = &[
    (|ua| ua.contains("windows"), "Windows"),
    (
        |ua| ua.contains("macintosh") || ua.contains("mac os x"),
        "macOS",
    ),
    (|ua| ua.contains("linux"), "Linux"),
    (|ua| ua.contains("android"), "Android"),
    (
        |ua| ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod"),
        "iOS",
    ),
];

// Mobile is checked before tablet: iPad strings can carry "mobile" too.
const DEVICE_RULES: &[Rule] = &[
    (
        |ua| {
            ua.contains("mobile")
                || ua.contains("android")
                || ua.contains("iphone")
                || ua.contains("ipod")
        },
        "mobile",
    ),
    (|ua| ua.contains("tablet") || ua.contains("ipad"), "tablet"),
];

const DEFAULT_DEVICE: &str = "desktop";

fn first_match(rules: &[Rule], ua: &str) -> Option<&'static str> {
    rules
        .iter()
        .find(|(matches, _)| matches(ua))
        .map(|(_, label)| *label)
}

/// Derive browser, OS and device class from a raw user agent.
///
/// An empty user agent yields no signals at all; otherwise the device class
/// always resolves (falling back to desktop) while browser and OS stay
/// `None` when nothing matches.
pub fn parse_user_agent(user_agent: &str) -> ClientSignals {
    if user_agent.is_empty() {
        return ClientSignals::default();
    }

    let ua = user_agent.to_lowercase();

    ClientSignals {
        browser: first_match(BROWSER_RULES, &ua),
        os: first_match(OS_RULES, &ua),
        device: Some(first_match(DEVICE_RULES, &ua).unwrap_or(DEFAULT_DEVICE)),
    }
}

/// Extract the referer host without a leading `www.`.
pub fn extract_domain(referer: &str) -> Option<String> {
    let parsed = Url::parse(referer).ok()?;
    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        return None;
    }
    Some(host.to_string())
}
