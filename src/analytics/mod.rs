//! Click tracking and analytics
//!
//! Signal extraction, fingerprinting and deduplication feed the redirect
//! pipeline; the report engine aggregates stored clicks for the dashboard.

pub mod client;
pub mod dedup;
pub mod fingerprint;
pub mod ip_extractor;
pub mod models;
pub mod report;
pub mod traffic;

pub use dedup::ClickDeduplicator;
pub use fingerprint::IdentityHasher;
pub use models::{
    AnalyticsReport, CampaignCount, ClickDimension, ClickFilter, ClickMoment, ClickRecord,
    ClickSource, ClientSignals, GroupCount, NewClick,
};
pub use report::{AnalyticsEngine, LinkScope, ReportPeriod};
pub use traffic::{categorize, TrafficSource};
