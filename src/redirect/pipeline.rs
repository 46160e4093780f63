//! Visit recording and redirect target construction

use anyhow::Result;
use axum::http::{header, HeaderMap, HeaderName};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::analytics::client::{extract_domain, parse_user_agent};
use crate::analytics::ip_extractor::extract_client_ip;
use crate::analytics::{ClickDeduplicator, IdentityHasher, NewClick};
use crate::models::ShortLink;
use crate::storage::Storage;

/// Turns one visit into a click record and a counter increment
pub struct RecordingPipeline {
    storage: Arc<dyn Storage>,
    hasher: IdentityHasher,
    dedup: ClickDeduplicator,
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl RecordingPipeline {
    pub fn new(storage: Arc<dyn Storage>, hasher: IdentityHasher, dedup_window: Duration) -> Self {
        let dedup = ClickDeduplicator::new(Arc::clone(&storage), dedup_window);
        Self {
            storage,
            hasher,
            dedup,
        }
    }

    /// Derive the click signals from the request headers and persist them.
    ///
    /// Campaign tags come from the link itself: the short URL carries no
    /// query string of its own.
    pub async fn record_visit(&self, link: &ShortLink, headers: &HeaderMap, now: i64) -> Result<()> {
        let ip_hash = self.hasher.fingerprint(&extract_client_ip(headers));
        let user_agent = header_string(headers, header::USER_AGENT);
        let referer = header_string(headers, header::REFERER);

        let signals = parse_user_agent(user_agent.as_deref().unwrap_or_default());
        let referer_domain = referer.as_deref().and_then(extract_domain);

        let is_unique = match self
            .dedup
            .is_unique(link.id, &ip_hash, user_agent.as_deref(), now)
            .await
        {
            Ok(is_unique) => is_unique,
            Err(err) => {
                warn!(
                    short_id = %link.short_id,
                    error = %err,
                    "uniqueness check failed, counting visit as unique"
                );
                true
            }
        };

        let click = NewClick {
            short_link_id: link.id,
            ip_hash,
            user_agent,
            browser: signals.browser.map(str::to_string),
            os: signals.os.map(str::to_string),
            device: signals.device.map(str::to_string),
            referer,
            referer_domain,
            tags: link.tags.clone(),
            country: None,
            region: None,
            city: None,
            is_unique,
            created_at: now,
        };

        let click_id = self.storage.insert_click(&click).await?;
        self.storage.increment_clicks(link.id).await?;

        debug!(
            short_id = %link.short_id,
            click_id,
            is_unique,
            browser = ?click.browser,
            device = ?click.device,
            "recorded click"
        );

        Ok(())
    }
}

/// Replace the first `name` parameter in place (dropping later duplicates),
/// or append it when absent.
fn set_query_param(pairs: &mut Vec<(String, String)>, name: &str, value: &str) {
    let mut seen = false;
    pairs.retain_mut(|(key, current)| {
        if key != name {
            return true;
        }
        if seen {
            return false;
        }
        seen = true;
        *current = value.to_string();
        true
    });

    if !seen {
        pairs.push((name.to_string(), value.to_string()));
    }
}

/// Final destination for a link: the stored URL with every stored campaign
/// tag written over any same-named query parameter. An unparsable stored URL
/// is returned untouched.
pub fn build_target_url(link: &ShortLink) -> String {
    let Ok(mut url) = Url::parse(&link.original_url) else {
        return link.original_url.clone();
    };

    if !link.tags.is_empty() {
        let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        for (name, value) in link.tags.query_pairs() {
            set_query_param(&mut pairs, name, value);
        }
        url.query_pairs_mut().clear().extend_pairs(&pairs);
    }

    url.to_string()
}
