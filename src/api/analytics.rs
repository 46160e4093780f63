//! Dashboard analytics handler

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use super::handlers::{api_error, ApiError, AppState};
use crate::analytics::{AnalyticsReport, LinkScope, ReportPeriod};
use crate::auth::AuthClaims;

#[derive(Debug, Deserialize)]
pub struct AnalyticsQueryParams {
    /// Window length in days: 1, 7, 30 or 90
    pub period: Option<String>,

    /// Restrict the report to one link
    #[serde(rename = "linkId")]
    pub link_id: Option<String>,
}

fn parse_period(raw: Option<&str>) -> Option<ReportPeriod> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Some(ReportPeriod::default()),
        Some(value) => value.parse::<u32>().ok().and_then(ReportPeriod::from_days),
    }
}

/// Full analytics report for the caller's links
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthClaims>,
    Query(params): Query<AnalyticsQueryParams>,
) -> Result<Json<AnalyticsReport>, ApiError> {
    let period = parse_period(params.period.as_deref())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Invalid period"))?;
    let scope = LinkScope::parse(params.link_id.as_deref());
    let now = chrono::Utc::now().timestamp();

    match state.engine.report(&claims.user_id, period, scope, now).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            error!(error = %e, "failed to build analytics report");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_defaults_to_thirty_days() {
        assert_eq!(parse_period(None), Some(ReportPeriod::Month));
        assert_eq!(parse_period(Some(" ")), Some(ReportPeriod::Month));
    }

    #[test]
    fn period_rejects_unknown_windows() {
        assert_eq!(parse_period(Some("7")), Some(ReportPeriod::Week));
        assert_eq!(parse_period(Some("14")), None);
        assert_eq!(parse_period(Some("week")), None);
        assert_eq!(parse_period(Some("-1")), None);
    }
}
