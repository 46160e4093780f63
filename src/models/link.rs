use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Campaign-attribution tags stored on a link and copied onto every click.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CampaignTags {
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
}

impl CampaignTags {
    /// Build tags from request parameters, dropping blank values.
    pub fn from_params(params: &UtmParams) -> Self {
        fn present(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }

        Self {
            utm_source: present(&params.utm_source),
            utm_medium: present(&params.utm_medium),
            utm_campaign: present(&params.utm_campaign),
            utm_term: present(&params.utm_term),
            utm_content: present(&params.utm_content),
        }
    }

    /// Query parameter name/value pairs for every tag that is set.
    pub fn query_pairs(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("utm_source", self.utm_source.as_deref()),
            ("utm_medium", self.utm_medium.as_deref()),
            ("utm_campaign", self.utm_campaign.as_deref()),
            ("utm_term", self.utm_term.as_deref()),
            ("utm_content", self.utm_content.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
    }

    pub fn is_empty(&self) -> bool {
        self.query_pairs().next().is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShortLink {
    pub id: i64,
    pub short_id: String,
    pub original_url: String,
    /// `None` for links created through the public endpoint.
    pub user_id: Option<String>,
    pub clicks: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub tags: CampaignTags,
    pub created_at: i64,
    pub updated_at: i64,
}

/// `utmParams` object accepted by the shorten endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UtmParams {
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    pub url: Option<serde_json::Value>,
    #[serde(default)]
    pub utm_params: Option<UtmParams>,
}
