//! HTTP adapter for the remote web-analytics Data API.
//!
//! Wraps `reqwest` with OAuth refresh-token handling and maps `runReport`
//! responses into [`PlatformData`]. The client is built from an explicit
//! [`AnalyticsConfig`]; nothing is read from the environment here.

use std::time::Duration;

use futures::future::try_join_all;
use pulse_core::coercion::compact_date;
use pulse_core::models::{
    BreakdownRow, DataPoint, DateRange, DimensionBreakdown, Metric, MetricSeries, PlatformData,
};
use pulse_core::settings::AnalyticsCredentials;
use pulse_core::stats::{calculate_stats, period_over_period_trend, saturating_total};
use reqwest::{Client, Response, StatusCode, Url};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub use crate::error::AnalyticsError;
use crate::report::{
    ApiErrorBody, ReportRow, RunReportRequest, RunReportResponse, TokenResponse, BREAKDOWNS,
};

pub const DEFAULT_API_BASE_URL: &str = "https://analyticsdata.googleapis.com";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Canonical metric fed by each column of the daily series request.
const SERIES_MAPPING: [(Metric, usize); 4] = [
    (Metric::Impressions, 0),
    (Metric::Reach, 1),
    (Metric::Interactions, 2),
    (Metric::Visits, 3),
];

// ── AnalyticsConfig ───────────────────────────────────────────────────────────

/// Everything the adapter needs, constructed by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub access_token: Option<String>,
    pub api_base_url: String,
    pub token_url: String,
    pub timeout_secs: u64,
}

impl AnalyticsConfig {
    pub fn new(client_id: &str, client_secret: &str, refresh_token: &str) -> Self {
        Self {
            client_id: client_id.to_owned(),
            client_secret: client_secret.to_owned(),
            refresh_token: refresh_token.to_owned(),
            access_token: None,
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            token_url: DEFAULT_TOKEN_URL.to_owned(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Point both endpoints at `base_url` (for testing with wiremock).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.api_base_url = base.to_owned();
        self.token_url = format!("{base}/token");
        self
    }

    pub fn with_access_token(mut self, token: &str) -> Self {
        self.access_token = Some(token.to_owned());
        self
    }
}

impl From<&AnalyticsCredentials> for AnalyticsConfig {
    fn from(creds: &AnalyticsCredentials) -> Self {
        let mut config = Self::new(&creds.client_id, &creds.client_secret, &creds.refresh_token);
        config.access_token = creds.access_token.clone();
        if let Some(url) = &creds.api_base_url {
            config.api_base_url = url.clone();
        }
        if let Some(url) = &creds.token_url {
            config.token_url = url.clone();
        }
        config
    }
}

// ── AnalyticsClient ───────────────────────────────────────────────────────────

/// Client for the analytics Data API.
///
/// The access token lives behind a [`RwLock`] so concurrent requests that hit
/// an expired token share a single refresh.
pub struct AnalyticsClient {
    client: Client,
    base_url: Url,
    token_url: Url,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    access_token: RwLock<Option<String>>,
}

impl AnalyticsClient {
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Http`] if the `reqwest::Client` cannot be
    /// built, or [`AnalyticsError::InvalidConfig`] for an unparsable URL.
    pub fn new(config: AnalyticsConfig) -> Result<Self, AnalyticsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("socialpulse/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let normalised = format!("{}/", config.api_base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| {
            AnalyticsError::InvalidConfig(format!("invalid API base URL '{}': {e}", config.api_base_url))
        })?;
        let token_url = Url::parse(&config.token_url).map_err(|e| {
            AnalyticsError::InvalidConfig(format!("invalid token URL '{}': {e}", config.token_url))
        })?;

        Ok(Self {
            client,
            base_url,
            token_url,
            client_id: config.client_id,
            client_secret: config.client_secret,
            refresh_token: config.refresh_token,
            access_token: RwLock::new(config.access_token.filter(|t| !t.is_empty())),
        })
    }

    /// Fetch the daily series, the dimension breakdowns and the previous
    /// period for `property` over `range`.
    ///
    /// All queries run concurrently; if any fails no partial result is
    /// returned. Series trends are the percentage change of the period total
    /// against the equal-length preceding period.
    pub async fn fetch_platform_data(
        &self,
        property: &str,
        range: DateRange,
    ) -> Result<PlatformData, AnalyticsError> {
        let previous_range = range.previous();
        let current_request = RunReportRequest::daily_series(&range);
        let previous_request = RunReportRequest::daily_series(&previous_range);
        let current = self.run_report(property, &current_request);
        let previous = self.run_report(property, &previous_request);
        let breakdowns = try_join_all(BREAKDOWNS.iter().map(|(dimension, limit)| async move {
            let response = self
                .run_report(property, &RunReportRequest::breakdown(&range, dimension, *limit))
                .await?;
            Ok::<_, AnalyticsError>(to_breakdown(dimension, &response))
        }));

        let (current, previous, breakdowns) = tokio::try_join!(current, previous, breakdowns)?;

        let mut data = PlatformData::default();
        for (metric, column) in SERIES_MAPPING {
            let points = to_points(&current.rows, column);
            let previous_total = saturating_total(previous.rows.iter().map(|r| r.metric(column)));
            let mut stats = calculate_stats(&points);
            stats.trend = period_over_period_trend(stats.total, previous_total);
            data.set_series(metric, MetricSeries::with_stats(points, stats));
        }
        data.breakdowns = breakdowns.into_iter().filter(|b| !b.rows.is_empty()).collect();

        info!(
            property,
            range = %range.label(),
            days = current.rows.len(),
            breakdowns = data.breakdowns.len(),
            "fetched web analytics"
        );
        Ok(data)
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// [`AnalyticsError::NotConnected`] when no refresh token is configured or
    /// the grant was rejected.
    pub async fn refresh_access_token(&self) -> Result<String, AnalyticsError> {
        let mut guard = self.access_token.write().await;
        let token = self.request_token().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    /// The access token currently in use, if one has been issued.
    pub async fn access_token(&self) -> Option<String> {
        self.access_token.read().await.clone()
    }

    // ── Private ───────────────────────────────────────────────────────────────

    /// Issue one `runReport` call, refreshing and retrying once on 401.
    async fn run_report(
        &self,
        property: &str,
        request: &RunReportRequest,
    ) -> Result<RunReportResponse, AnalyticsError> {
        let url = self.report_url(property)?;
        let token = self.current_token().await?;

        let response = self.post_report(&url, &token, request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::parse_report(&url, response).await;
        }

        debug!("access token rejected; refreshing once");
        let token = self.refresh_after(&token).await?;
        let response = self.post_report(&url, &token, request).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("request unauthorized after token refresh");
            return Err(AnalyticsError::NotConnected(
                "authorization rejected after refreshing the access token".to_string(),
            ));
        }
        Self::parse_report(&url, response).await
    }

    fn report_url(&self, property: &str) -> Result<Url, AnalyticsError> {
        let property = property.trim().trim_start_matches("properties/");
        self.base_url
            .join(&format!("v1beta/properties/{property}:runReport"))
            .map_err(|e| AnalyticsError::InvalidConfig(format!("invalid property '{property}': {e}")))
    }

    async fn post_report(
        &self,
        url: &Url,
        token: &str,
        request: &RunReportRequest,
    ) -> Result<Response, AnalyticsError> {
        Ok(self
            .client
            .post(url.clone())
            .bearer_auth(token)
            .json(request)
            .send()
            .await?)
    }

    async fn parse_report(url: &Url, response: Response) -> Result<RunReportResponse, AnalyticsError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
            return Err(AnalyticsError::Api {
                status: status.as_u16(),
                message,
            });
        }
        serde_json::from_str(&body).map_err(|e| AnalyticsError::Deserialize {
            context: url.to_string(),
            source: e,
        })
    }

    /// The cached access token, fetching one first if none is held.
    async fn current_token(&self) -> Result<String, AnalyticsError> {
        if let Some(token) = self.access_token.read().await.clone() {
            return Ok(token);
        }
        let mut guard = self.access_token.write().await;
        if let Some(token) = guard.clone() {
            return Ok(token);
        }
        let token = self.request_token().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    /// Replace `stale` with a fresh token unless another request already did.
    async fn refresh_after(&self, stale: &str) -> Result<String, AnalyticsError> {
        let mut guard = self.access_token.write().await;
        if let Some(current) = guard.as_deref() {
            if current != stale {
                return Ok(current.to_string());
            }
        }
        let token = self.request_token().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    async fn request_token(&self) -> Result<String, AnalyticsError> {
        if self.refresh_token.trim().is_empty() {
            return Err(AnalyticsError::NotConnected(
                "no refresh token configured".to_string(),
            ));
        }

        let response = self
            .client
            .post(self.token_url.clone())
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: TokenResponse = serde_json::from_str(&body).unwrap_or_default();

        if !status.is_success() {
            if parsed.error.as_deref() == Some("invalid_grant")
                || status == StatusCode::UNAUTHORIZED
            {
                return Err(AnalyticsError::NotConnected(
                    parsed
                        .error_description
                        .unwrap_or_else(|| "refresh token was rejected".to_string()),
                ));
            }
            return Err(AnalyticsError::Api {
                status: status.as_u16(),
                message: parsed
                    .error_description
                    .or(parsed.error)
                    .unwrap_or_else(|| "token refresh failed".to_string()),
            });
        }

        debug!("access token refreshed");
        parsed.access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
            AnalyticsError::Api {
                status: status.as_u16(),
                message: "token response carried no access_token".to_string(),
            }
        })
    }
}

// ── Mapping ───────────────────────────────────────────────────────────────────

/// Daily points for metric column `column`; rows with an unreadable date are
/// skipped.
fn to_points(rows: &[ReportRow], column: usize) -> Vec<DataPoint> {
    rows.iter()
        .filter_map(|row| {
            let date = row.dimension(0).and_then(compact_date)?;
            Some(DataPoint::new(date, row.metric(column)))
        })
        .collect()
}

/// Rows without a label are dropped.
fn to_breakdown(dimension: &str, response: &RunReportResponse) -> DimensionBreakdown {
    DimensionBreakdown {
        dimension: dimension.to_string(),
        rows: response
            .rows
            .iter()
            .filter_map(|row| {
                let label = row.dimension(0).map(str::trim).filter(|l| !l.is_empty())?;
                Some(BreakdownRow {
                    label: label.to_string(),
                    value: row.metric(0),
                })
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn test_client(base_url: &str) -> AnalyticsClient {
        AnalyticsClient::new(AnalyticsConfig::new("id", "secret", "refresh").with_base_url(base_url))
            .expect("client construction should not fail")
    }

    #[test]
    fn test_report_url_accepts_prefixed_property() {
        let client = test_client("https://api.example.com/");
        assert_eq!(
            client.report_url("123").unwrap().as_str(),
            "https://api.example.com/v1beta/properties/123:runReport"
        );
        assert_eq!(
            client.report_url("properties/123").unwrap().as_str(),
            "https://api.example.com/v1beta/properties/123:runReport"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let err = AnalyticsClient::new(AnalyticsConfig::new("a", "b", "c").with_base_url("not a url"))
            .err()
            .unwrap();
        assert!(matches!(err, AnalyticsError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_from_credentials() {
        let creds = AnalyticsCredentials {
            client_id: "cid".into(),
            client_secret: "sec".into(),
            refresh_token: "rt".into(),
            access_token: Some("at".into()),
            api_base_url: None,
            token_url: Some("http://localhost/token".into()),
        };
        let config = AnalyticsConfig::from(&creds);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.token_url, "http://localhost/token");
        assert_eq!(config.access_token.as_deref(), Some("at"));
    }

    #[test]
    fn test_to_points_skips_bad_dates() {
        let rows: Vec<ReportRow> = serde_json::from_value(serde_json::json!([
            {"dimensionValues": [{"value": "20240102"}], "metricValues": [{"value": "5"}]},
            {"dimensionValues": [{"value": "(other)"}], "metricValues": [{"value": "9"}]}
        ]))
        .unwrap();
        let points = to_points(&rows, 0);
        assert_eq!(
            points,
            vec![DataPoint::new(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 5)]
        );
    }

    #[test]
    fn test_to_breakdown_drops_unlabelled_rows() {
        let response: RunReportResponse = serde_json::from_value(serde_json::json!({
            "rows": [
                {"dimensionValues": [{"value": "/home"}], "metricValues": [{"value": "12"}]},
                {"dimensionValues": [{"value": ""}], "metricValues": [{"value": "4"}]},
                {"dimensionValues": [{"value": "  "}], "metricValues": [{"value": "2"}]},
                {"metricValues": [{"value": "1"}]}
            ]
        }))
        .unwrap();
        let breakdown = to_breakdown("pagePath", &response);
        assert_eq!(breakdown.dimension, "pagePath");
        assert_eq!(
            breakdown.rows,
            vec![BreakdownRow {
                label: "/home".to_string(),
                value: 12
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_refresh_token_is_not_connected() {
        let client =
            AnalyticsClient::new(AnalyticsConfig::new("id", "secret", "").with_base_url("http://127.0.0.1:9"))
                .unwrap();
        let err = client.refresh_access_token().await.unwrap_err();
        assert!(err.is_recoverable());
    }
}
