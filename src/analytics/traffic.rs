//! Traffic source classification
//!
//! Categories are recomputed at report time from the stored referer domain
//! and `utm_medium` tag; nothing here is persisted.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TrafficSource {
    Direct,
    Email,
    SocialMedia,
    PaidSearch,
    OrganicSearch,
    Referral,
    Messengers,
    Other,
}

impl TrafficSource {
    pub fn label(self) -> &'static str {
        match self {
            TrafficSource::Direct => "Direct",
            TrafficSource::Email => "Email",
            TrafficSource::SocialMedia => "Social Media",
            TrafficSource::PaidSearch => "Paid Search",
            TrafficSource::OrganicSearch => "Organic Search",
            TrafficSource::Referral => "Referral",
            TrafficSource::Messengers => "Messengers",
            TrafficSource::Other => "Other",
        }
    }
}

impl std::fmt::Display for TrafficSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

const MEDIUM_RULES: &[(&[&str], TrafficSource)] = &[
    (&["email"], TrafficSource::Email),
    (&["social"], TrafficSource::SocialMedia),
    (&["cpc", "ppc"], TrafficSource::PaidSearch),
    (&["organic"], TrafficSource::OrganicSearch),
    (&["referral"], TrafficSource::Referral),
];

const SOCIAL_DOMAINS: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "instagram.com",
    "linkedin.com",
    "youtube.com",
    "tiktok.com",
    "vk.com",
    "telegram.org",
];

const SEARCH_DOMAINS: &[&str] = &[
    "google.com",
    "bing.com",
    "yahoo.com",
    "yandex.ru",
    "duckduckgo.com",
];

// Outbound redirectors used by social apps and messengers.
const REDIRECTOR_DOMAINS: &[&str] = &["t.co", "l.facebook.com", "l.instagram.com", "out.reddit.com"];

/// Domain lists in evaluation order. A domain containing any listed entry as
/// a substring matches that list.
const DOMAIN_RULES: &[(&[&str], TrafficSource)] = &[
    (SOCIAL_DOMAINS, TrafficSource::SocialMedia),
    (SEARCH_DOMAINS, TrafficSource::OrganicSearch),
    (REDIRECTOR_DOMAINS, TrafficSource::Messengers),
];

fn classify_medium(medium: &str) -> TrafficSource {
    let medium = medium.to_lowercase();
    MEDIUM_RULES
        .iter()
        .find(|(values, _)| values.contains(&medium.as_str()))
        .map(|(_, source)| *source)
        .unwrap_or(TrafficSource::Other)
}

fn classify_domain(domain: &str) -> TrafficSource {
    DOMAIN_RULES
        .iter()
        .find(|(domains, _)| domains.iter().any(|d| domain.contains(d)))
        .map(|(_, source)| *source)
        .unwrap_or(TrafficSource::Referral)
}

/// Classify one click by its referer domain and campaign medium.
///
/// The medium tag takes precedence over the referer: a tagged link is
/// attributed by its campaign even when a referer is present.
pub fn categorize(referer_domain: Option<&str>, utm_medium: Option<&str>) -> TrafficSource {
    let domain = referer_domain.filter(|d| !d.is_empty());
    let medium = utm_medium.filter(|m| !m.is_empty());

    match (domain, medium) {
        (None, None) => TrafficSource::Direct,
        (_, Some(medium)) => classify_medium(medium),
        (Some(domain), None) => classify_domain(domain),
    }
}
