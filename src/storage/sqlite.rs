use crate::analytics::{
    CampaignCount, ClickDimension, ClickFilter, ClickMoment, ClickRecord, ClickSource, GroupCount,
    NewClick,
};
use crate::models::{CampaignTags, ShortLink};
use crate::storage::{LinkTotals, Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;

const LINK_COLUMNS: &str = "id, short_id, original_url, user_id, clicks, \
     utm_source, utm_medium, utm_campaign, utm_term, utm_content, created_at, updated_at";

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool; `init` still has to be called
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

/// Append the shared FROM/WHERE clause scoping clicks to one owner and window
fn push_scope(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ClickFilter) {
    builder.push(
        " FROM click_analytics c JOIN short_links l ON l.id = c.short_link_id WHERE l.user_id = ",
    );
    builder.push_bind(filter.user_id.clone());
    builder.push(" AND c.created_at >= ");
    builder.push_bind(filter.since);
    builder.push(" AND c.created_at <= ");
    builder.push_bind(filter.until);
    if let Some(link_id) = filter.link_id {
        builder.push(" AND c.short_link_id = ");
        builder.push_bind(link_id);
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS short_links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                short_id TEXT NOT NULL UNIQUE,
                original_url TEXT NOT NULL,
                user_id TEXT,
                clicks INTEGER NOT NULL DEFAULT 0,
                utm_source TEXT,
                utm_medium TEXT,
                utm_campaign TEXT,
                utm_term TEXT,
                utm_content TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_short_links_user ON short_links(user_id)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS click_analytics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                short_link_id INTEGER NOT NULL REFERENCES short_links(id) ON DELETE CASCADE,
                ip_hash TEXT NOT NULL,
                user_agent TEXT,
                browser TEXT,
                os TEXT,
                device TEXT,
                referer TEXT,
                referer_domain TEXT,
                utm_source TEXT,
                utm_medium TEXT,
                utm_campaign TEXT,
                utm_term TEXT,
                utm_content TEXT,
                country TEXT,
                region TEXT,
                city TEXT,
                is_unique INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_clicks_link_time ON click_analytics(short_link_id, created_at)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_clicks_ip_hash ON click_analytics(ip_hash)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn create_link(
        &self,
        short_id: &str,
        original_url: &str,
        user_id: Option<&str>,
        tags: &CampaignTags,
    ) -> StorageResult<ShortLink> {
        let now = chrono::Utc::now().timestamp();

        let link = sqlx::query_as::<_, ShortLink>(&format!(
            r#"
            INSERT INTO short_links (
                short_id, original_url, user_id,
                utm_source, utm_medium, utm_campaign, utm_term, utm_content,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(short_id) DO NOTHING
            RETURNING {LINK_COLUMNS}
            "#
        ))
        .bind(short_id)
        .bind(original_url)
        .bind(user_id)
        .bind(tags.utm_source.as_deref())
        .bind(tags.utm_medium.as_deref())
        .bind(tags.utm_campaign.as_deref())
        .bind(tags.utm_term.as_deref())
        .bind(tags.utm_content.as_deref())
        .bind(now)
        .bind(now)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        link.ok_or(StorageError::Conflict)
    }

    async fn short_id_exists(&self, short_id: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM short_links WHERE short_id = ?")
                .bind(short_id)
                .fetch_one(self.pool.as_ref())
                .await?;

        Ok(count > 0)
    }

    async fn get_link(&self, short_id: &str) -> Result<Option<ShortLink>> {
        let link = sqlx::query_as::<_, ShortLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM short_links WHERE short_id = ?"
        ))
        .bind(short_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn get_owned_link(&self, id: i64, user_id: &str) -> Result<Option<ShortLink>> {
        let link = sqlx::query_as::<_, ShortLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM short_links WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn list_links(&self, user_id: &str) -> Result<Vec<ShortLink>> {
        let links = sqlx::query_as::<_, ShortLink>(&format!(
            r#"
            SELECT {LINK_COLUMNS}
            FROM short_links
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(links)
    }

    async fn delete_link(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM click_analytics WHERE short_link_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM short_links WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_clicks(&self, id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE short_links
            SET clicks = clicks + 1, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn link_totals(&self, user_id: &str) -> Result<LinkTotals> {
        let (total_links, total_clicks) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COALESCE(SUM(clicks), 0) FROM short_links WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(LinkTotals {
            total_links,
            total_clicks,
        })
    }

    async fn insert_click(&self, click: &NewClick) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO click_analytics (
                short_link_id, ip_hash, user_agent, browser, os, device,
                referer, referer_domain,
                utm_source, utm_medium, utm_campaign, utm_term, utm_content,
                country, region, city, is_unique, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(click.short_link_id)
        .bind(&click.ip_hash)
        .bind(click.user_agent.as_deref())
        .bind(click.browser.as_deref())
        .bind(click.os.as_deref())
        .bind(click.device.as_deref())
        .bind(click.referer.as_deref())
        .bind(click.referer_domain.as_deref())
        .bind(click.tags.utm_source.as_deref())
        .bind(click.tags.utm_medium.as_deref())
        .bind(click.tags.utm_campaign.as_deref())
        .bind(click.tags.utm_term.as_deref())
        .bind(click.tags.utm_content.as_deref())
        .bind(click.country.as_deref())
        .bind(click.region.as_deref())
        .bind(click.city.as_deref())
        .bind(click.is_unique)
        .bind(click.created_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(id)
    }

    async fn click_exists_since(
        &self,
        short_link_id: i64,
        ip_hash: &str,
        user_agent: Option<&str>,
        since: i64,
    ) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM click_analytics
            WHERE short_link_id = ? AND ip_hash = ? AND user_agent IS ? AND created_at >= ?
            LIMIT 1
            "#,
        )
        .bind(short_link_id)
        .bind(ip_hash)
        .bind(user_agent)
        .bind(since)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(found.is_some())
    }

    async fn has_clicks(&self) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM click_analytics LIMIT 1")
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(found.is_some())
    }

    async fn recent_clicks(&self, short_link_id: i64, limit: i64) -> Result<Vec<ClickRecord>> {
        let rows = sqlx::query_as::<_, ClickRecord>(
            r#"
            SELECT id, short_link_id, ip_hash, user_agent, browser, os, device,
                   referer, referer_domain,
                   utm_source, utm_medium, utm_campaign, utm_term, utm_content,
                   country, region, city, is_unique, created_at
            FROM click_analytics
            WHERE short_link_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(short_link_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }

    async fn count_clicks(&self, filter: &ClickFilter, unique_only: bool) -> Result<i64> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*)");
        push_scope(&mut builder, filter);
        if unique_only {
            builder.push(" AND c.is_unique = ");
            builder.push_bind(true);
        }

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }

    async fn group_clicks(
        &self,
        filter: &ClickFilter,
        dimension: ClickDimension,
        limit: Option<i64>,
    ) -> Result<Vec<GroupCount>> {
        let column = dimension.column();
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT c.{column} AS label, COUNT(*) AS clicks"));
        push_scope(&mut builder, filter);
        builder.push(format!(
            " GROUP BY c.{column} ORDER BY clicks DESC, label ASC NULLS LAST"
        ));
        if let Some(limit) = limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }

        let rows = builder
            .build_query_as::<GroupCount>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(rows)
    }

    async fn group_campaigns(
        &self,
        filter: &ClickFilter,
        limit: i64,
    ) -> Result<Vec<CampaignCount>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT c.utm_campaign, c.utm_source, c.utm_medium, COUNT(*) AS clicks",
        );
        push_scope(&mut builder, filter);
        builder.push(
            r#"
            AND (c.utm_campaign IS NOT NULL OR c.utm_source IS NOT NULL OR c.utm_medium IS NOT NULL)
            GROUP BY c.utm_campaign, c.utm_source, c.utm_medium
            ORDER BY clicks DESC, c.utm_campaign ASC NULLS LAST,
                     c.utm_source ASC NULLS LAST, c.utm_medium ASC NULLS LAST
            LIMIT "#,
        );
        builder.push_bind(limit);

        let rows = builder
            .build_query_as::<CampaignCount>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(rows)
    }

    async fn click_moments(&self, filter: &ClickFilter) -> Result<Vec<ClickMoment>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT c.created_at, c.is_unique");
        push_scope(&mut builder, filter);
        builder.push(" ORDER BY c.created_at DESC");

        let rows = builder
            .build_query_as::<ClickMoment>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(rows)
    }

    async fn click_sources(&self, filter: &ClickFilter) -> Result<Vec<ClickSource>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT c.referer_domain, c.utm_medium");
        push_scope(&mut builder, filter);

        let rows = builder
            .build_query_as::<ClickSource>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(rows)
    }
}
