use crate::analytics::{
    CampaignCount, ClickDimension, ClickFilter, ClickMoment, ClickRecord, ClickSource, GroupCount,
    NewClick,
};
use crate::models::{CampaignTags, ShortLink};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("short id already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Counter summary for the dashboard stats endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkTotals {
    pub total_links: i64,
    pub total_clicks: i64,
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    // ---- short links ----

    /// Create a link with a caller-generated short id.
    /// Returns `StorageError::Conflict` if the short id is taken.
    async fn create_link(
        &self,
        short_id: &str,
        original_url: &str,
        user_id: Option<&str>,
        tags: &CampaignTags,
    ) -> StorageResult<ShortLink>;

    /// Check whether a short id is already in use
    async fn short_id_exists(&self, short_id: &str) -> Result<bool>;

    /// Resolve a link by its short id
    async fn get_link(&self, short_id: &str) -> Result<Option<ShortLink>>;

    /// Fetch a link by numeric id, only if owned by `user_id`
    async fn get_owned_link(&self, id: i64, user_id: &str) -> Result<Option<ShortLink>>;

    /// All links owned by a user, newest first
    async fn list_links(&self, user_id: &str) -> Result<Vec<ShortLink>>;

    /// Delete a link and its click records
    async fn delete_link(&self, id: i64) -> Result<bool>;

    /// Atomically increment the click counter
    async fn increment_clicks(&self, id: i64) -> Result<()>;

    /// Link count and summed click counters for a user
    async fn link_totals(&self, user_id: &str) -> Result<LinkTotals>;

    // ---- click records ----

    /// Persist one click record, returning its id
    async fn insert_click(&self, click: &NewClick) -> Result<i64>;

    /// Whether a click for this link, fingerprint and user agent exists at or
    /// after `since`. A missing user agent only matches other missing ones.
    async fn click_exists_since(
        &self,
        short_link_id: i64,
        ip_hash: &str,
        user_agent: Option<&str>,
        since: i64,
    ) -> Result<bool>;

    /// Whether the click table holds any rows at all
    async fn has_clicks(&self) -> Result<bool>;

    /// Most recent click records of one link
    async fn recent_clicks(&self, short_link_id: i64, limit: i64) -> Result<Vec<ClickRecord>>;

    /// Count clicks in scope, optionally only unique ones
    async fn count_clicks(&self, filter: &ClickFilter, unique_only: bool) -> Result<i64>;

    /// Count clicks grouped by one column, most frequent first.
    /// Null values form their own group.
    async fn group_clicks(
        &self,
        filter: &ClickFilter,
        dimension: ClickDimension,
        limit: Option<i64>,
    ) -> Result<Vec<GroupCount>>;

    /// Count clicks grouped by (campaign, source, medium) over clicks carrying
    /// at least one of the three tags, most frequent first
    async fn group_campaigns(&self, filter: &ClickFilter, limit: i64)
        -> Result<Vec<CampaignCount>>;

    /// Timestamps and uniqueness flags of clicks in scope, newest first
    async fn click_moments(&self, filter: &ClickFilter) -> Result<Vec<ClickMoment>>;

    /// Referer domains and mediums of clicks in scope
    async fn click_sources(&self, filter: &ClickFilter) -> Result<Vec<ClickSource>>;
}
