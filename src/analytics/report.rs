//! Analytics aggregation engine
//!
//! Builds the dashboard report for one user from the click table. The
//! independent sub-queries run concurrently and each one degrades to an
//! empty result on failure, so a single bad query never sinks the report.

use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::models::{
    AnalyticsReport, BrowserClicks, CampaignClicks, ClickDimension, ClickFilter, ClickMoment,
    ClickSource, CountryClicks, DeviceClicks, LinkSummary, Overview, RefererClicks, SourceCount,
    Technology, TimelinePoint, TrafficSources, UtmBreakdown,
};
use super::traffic::{categorize, TrafficSource};
use crate::storage::Storage;

/// Row limit for the ranked lists (countries, referers, campaigns)
pub const TOP_LIMIT: i64 = 10;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

const UNKNOWN: &str = "Unknown";
const DIRECT: &str = "Direct";
const NOT_AVAILABLE: &str = "N/A";

/// Reporting window in days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportPeriod {
    Day,
    Week,
    #[default]
    Month,
    Quarter,
}

impl ReportPeriod {
    pub fn from_days(days: u32) -> Option<Self> {
        match days {
            1 => Some(ReportPeriod::Day),
            7 => Some(ReportPeriod::Week),
            30 => Some(ReportPeriod::Month),
            90 => Some(ReportPeriod::Quarter),
            _ => None,
        }
    }

    pub fn days(self) -> i64 {
        match self {
            ReportPeriod::Day => 1,
            ReportPeriod::Week => 7,
            ReportPeriod::Month => 30,
            ReportPeriod::Quarter => 90,
        }
    }
}

/// Which links a report covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkScope {
    All,
    Link(i64),
    /// The requested link id could not be interpreted; no click matches.
    Unmatched,
}

impl LinkScope {
    /// Interpret the raw `linkId` query value
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).filter(|v| !v.is_empty()) {
            None => LinkScope::All,
            Some(value) => value
                .parse::<i64>()
                .map(LinkScope::Link)
                .unwrap_or(LinkScope::Unmatched),
        }
    }
}

pub struct AnalyticsEngine {
    storage: Arc<dyn Storage>,
}

/// Await a sub-query, logging and substituting the empty value on failure
async fn settle<T, F>(part: &'static str, query: F) -> T
where
    T: Default,
    F: Future<Output = Result<T>>,
{
    match query.await {
        Ok(value) => value,
        Err(err) => {
            warn!(part, error = %err, "analytics sub-query failed, using empty result");
            T::default()
        }
    }
}

impl AnalyticsEngine {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Build the report for `user_id` over the `period` ending at `now`
    /// (unix seconds).
    ///
    /// Fails only when the link list or the emptiness probe fails; every
    /// click aggregate is fault tolerant on its own.
    pub async fn report(
        &self,
        user_id: &str,
        period: ReportPeriod,
        scope: LinkScope,
        now: i64,
    ) -> Result<AnalyticsReport> {
        let links = self
            .storage
            .list_links(user_id)
            .await?
            .into_iter()
            .map(|link| LinkSummary {
                id: link.id,
                short_id: link.short_id,
                original_url: link.original_url,
                clicks: link.clicks,
            })
            .collect();

        // A fresh deployment has an empty click table; skip the grouped queries.
        if !self.storage.has_clicks().await? {
            debug!(user_id, "click table is empty, returning empty report");
            return Ok(AnalyticsReport {
                links,
                ..AnalyticsReport::default()
            });
        }

        let link_id = match scope {
            LinkScope::All => None,
            LinkScope::Link(id) => Some(id),
            LinkScope::Unmatched => {
                debug!(user_id, "link filter matches nothing, returning empty report");
                return Ok(AnalyticsReport {
                    links,
                    ..AnalyticsReport::default()
                });
            }
        };

        let filter = ClickFilter {
            user_id: user_id.to_string(),
            link_id,
            since: now - period.days() * SECONDS_PER_DAY,
            until: now,
        };
        let storage = self.storage.as_ref();

        let (total, unique, countries, referers, campaigns, browsers, devices, moments, sources) = tokio::join!(
            settle("total", storage.count_clicks(&filter, false)),
            settle("unique", storage.count_clicks(&filter, true)),
            settle(
                "countries",
                storage.group_clicks(&filter, ClickDimension::Country, Some(TOP_LIMIT))
            ),
            settle(
                "referers",
                storage.group_clicks(&filter, ClickDimension::RefererDomain, Some(TOP_LIMIT))
            ),
            settle("campaigns", storage.group_campaigns(&filter, TOP_LIMIT)),
            settle(
                "browsers",
                storage.group_clicks(&filter, ClickDimension::Browser, None)
            ),
            settle(
                "devices",
                storage.group_clicks(&filter, ClickDimension::Device, None)
            ),
            settle("timeline", storage.click_moments(&filter)),
            settle("traffic sources", storage.click_sources(&filter)),
        );

        let label = |value: Option<String>, fallback: &str| {
            value.unwrap_or_else(|| fallback.to_string())
        };

        Ok(AnalyticsReport {
            overview: overview(total, unique),
            geography: countries
                .into_iter()
                .map(|row| CountryClicks {
                    country: label(row.label, UNKNOWN),
                    clicks: row.clicks,
                })
                .collect(),
            traffic_sources: TrafficSources {
                categories: source_counts(&sources),
                referers: referers
                    .into_iter()
                    .map(|row| RefererClicks {
                        domain: label(row.label, DIRECT),
                        clicks: row.clicks,
                    })
                    .collect(),
            },
            utm: UtmBreakdown {
                campaigns: campaigns
                    .into_iter()
                    .map(|row| CampaignClicks {
                        campaign: label(row.utm_campaign, NOT_AVAILABLE),
                        source: label(row.utm_source, NOT_AVAILABLE),
                        medium: label(row.utm_medium, NOT_AVAILABLE),
                        clicks: row.clicks,
                    })
                    .collect(),
            },
            technology: Technology {
                browsers: browsers
                    .into_iter()
                    .map(|row| BrowserClicks {
                        browser: label(row.label, UNKNOWN),
                        clicks: row.clicks,
                    })
                    .collect(),
                devices: devices
                    .into_iter()
                    .map(|row| DeviceClicks {
                        device: label(row.label, UNKNOWN),
                        clicks: row.clicks,
                    })
                    .collect(),
            },
            timeline: timeline(&moments),
            links,
        })
    }
}

fn overview(total: i64, unique: i64) -> Overview {
    let unique_rate = if total > 0 {
        ((unique as f64 / total as f64) * 100.0).round() as i64
    } else {
        0
    };

    Overview {
        total_clicks: total,
        unique_clicks: unique,
        repeat_clicks: (total - unique).max(0),
        unique_rate,
    }
}

/// Categorise every click and rank the categories by volume
fn source_counts(sources: &[ClickSource]) -> Vec<SourceCount> {
    let mut counts: HashMap<TrafficSource, i64> = HashMap::new();
    for click in sources {
        let category = categorize(click.referer_domain.as_deref(), click.utm_medium.as_deref());
        *counts.entry(category).or_insert(0) += 1;
    }

    let mut ranked: Vec<SourceCount> = counts
        .into_iter()
        .map(|(source, count)| SourceCount {
            source: source.label().to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.source.cmp(&b.source)));
    ranked
}

/// Bucket clicks per UTC day, newest day first
fn timeline(moments: &[ClickMoment]) -> Vec<TimelinePoint> {
    let mut days: BTreeMap<String, (i64, i64)> = BTreeMap::new();
    for moment in moments {
        let Some(at) = chrono::DateTime::from_timestamp(moment.created_at, 0) else {
            continue;
        };
        let entry = days
            .entry(at.date_naive().format("%Y-%m-%d").to_string())
            .or_insert((0, 0));
        entry.0 += 1;
        if moment.is_unique {
            entry.1 += 1;
        }
    }

    days.into_iter()
        .rev()
        .map(|(date, (clicks, unique_clicks))| TimelinePoint {
            date,
            clicks,
            unique_clicks,
        })
        .collect()
}
