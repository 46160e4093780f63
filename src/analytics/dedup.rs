//! Unique-visit detection over a trailing time window

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::storage::Storage;

/// Decides whether a visit is the first from its fingerprint and user agent
/// within the window.
///
/// The check reads the click table before the new record is written, so two
/// identical visits racing each other can both come out unique. Uniqueness
/// is an analytics approximation and this is accepted.
#[derive(Clone)]
pub struct ClickDeduplicator {
    storage: Arc<dyn Storage>,
    window: Duration,
}

impl ClickDeduplicator {
    pub fn new(storage: Arc<dyn Storage>, window: Duration) -> Self {
        Self { storage, window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// `now` is a unix timestamp in seconds
    pub async fn is_unique(
        &self,
        short_link_id: i64,
        ip_hash: &str,
        user_agent: Option<&str>,
        now: i64,
    ) -> Result<bool> {
        let window = i64::try_from(self.window.as_secs()).unwrap_or(i64::MAX);
        let since = now.saturating_sub(window);
        let seen = self
            .storage
            .click_exists_since(short_link_id, ip_hash, user_agent, since)
            .await?;
        Ok(!seen)
    }
}
