//! Data models for click recording and reporting

use serde::Serialize;

use crate::models::CampaignTags;

/// Browser, operating system and device class derived from a user agent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSignals {
    pub browser: Option<&'static str>,
    pub os: Option<&'static str>,
    pub device: Option<&'static str>,
}

/// A click about to be persisted
#[derive(Debug, Clone)]
pub struct NewClick {
    pub short_link_id: i64,

    /// Salted hash of the client IP
    pub ip_hash: String,

    pub user_agent: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device: Option<String>,
    pub referer: Option<String>,
    pub referer_domain: Option<String>,

    /// Copied from the link at visit time
    pub tags: CampaignTags,

    /// Geography stays unresolved until a geolocation provider exists
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,

    pub is_unique: bool,

    /// Unix timestamp (seconds)
    pub created_at: i64,
}

/// A persisted click
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ClickRecord {
    pub id: i64,
    pub short_link_id: i64,
    pub ip_hash: String,
    pub user_agent: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device: Option<String>,
    pub referer: Option<String>,
    pub referer_domain: Option<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub tags: CampaignTags,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub is_unique: bool,
    pub created_at: i64,
}

/// Scope shared by every reporting query: one owner, a time range and
/// optionally a single link.
#[derive(Debug, Clone)]
pub struct ClickFilter {
    pub user_id: String,
    pub link_id: Option<i64>,
    /// Inclusive lower bound (unix seconds)
    pub since: i64,
    /// Inclusive upper bound (unix seconds)
    pub until: i64,
}

/// Single-column dimensions available for grouped counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickDimension {
    Country,
    RefererDomain,
    Browser,
    Device,
}

impl ClickDimension {
    pub fn column(self) -> &'static str {
        match self {
            ClickDimension::Country => "country",
            ClickDimension::RefererDomain => "referer_domain",
            ClickDimension::Browser => "browser",
            ClickDimension::Device => "device",
        }
    }
}

/// Result row of a single-column grouped count
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct GroupCount {
    pub label: Option<String>,
    pub clicks: i64,
}

/// Result row of the (campaign, source, medium) grouped count
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CampaignCount {
    pub utm_campaign: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub clicks: i64,
}

/// Minimal projection used for the daily timeline
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClickMoment {
    pub created_at: i64,
    pub is_unique: bool,
}

/// Minimal projection used for traffic-source categorisation
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClickSource {
    pub referer_domain: Option<String>,
    pub utm_medium: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_clicks: i64,
    pub unique_clicks: i64,
    pub repeat_clicks: i64,
    pub unique_rate: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryClicks {
    pub country: String,
    pub clicks: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCount {
    pub source: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefererClicks {
    pub domain: String,
    pub clicks: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrafficSources {
    pub categories: Vec<SourceCount>,
    pub referers: Vec<RefererClicks>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignClicks {
    pub campaign: String,
    pub source: String,
    pub medium: String,
    pub clicks: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UtmBreakdown {
    pub campaigns: Vec<CampaignClicks>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrowserClicks {
    pub browser: String,
    pub clicks: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceClicks {
    pub device: String,
    pub clicks: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Technology {
    pub browsers: Vec<BrowserClicks>,
    pub devices: Vec<DeviceClicks>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    /// UTC calendar day, `YYYY-MM-DD`
    pub date: String,
    pub clicks: i64,
    pub unique_clicks: i64,
}

/// Link entry used by the dashboard filter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSummary {
    pub id: i64,
    pub short_id: String,
    pub original_url: String,
    pub clicks: i64,
}

/// Full analytics report for one user
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub overview: Overview,
    pub geography: Vec<CountryClicks>,
    pub traffic_sources: TrafficSources,
    pub utm: UtmBreakdown,
    pub technology: Technology,
    pub timeline: Vec<TimelinePoint>,
    pub links: Vec<LinkSummary>,
}
