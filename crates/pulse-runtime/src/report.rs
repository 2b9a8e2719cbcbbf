//! `runReport` request bodies and response shapes for the analytics Data API.

use pulse_core::models::DateRange;
use serde::{Deserialize, Serialize};

/// Metrics requested for the daily series, in response column order.
pub const SERIES_METRICS: [&str; 4] = ["screenPageViews", "totalUsers", "engagedSessions", "sessions"];

/// Dimension breakdowns fetched alongside the series, with an optional row cap.
pub const BREAKDOWNS: [(&str, Option<u32>); 4] = [
    ("sessionDefaultChannelGroup", None),
    ("deviceCategory", None),
    ("country", None),
    ("pagePath", Some(10)),
];

/// Metric ranking breakdown rows.
pub const BREAKDOWN_METRIC: &str = "sessions";

// ── Request ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunReportRequest {
    pub date_ranges: Vec<ApiDateRange>,
    pub dimensions: Vec<Named>,
    pub metrics: Vec<Named>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_bys: Vec<OrderBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiDateRange {
    pub start_date: String,
    pub end_date: String,
}

impl From<&DateRange> for ApiDateRange {
    fn from(range: &DateRange) -> Self {
        Self {
            start_date: range.start.format("%Y-%m-%d").to_string(),
            end_date: range.end.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Named {
    pub name: String,
}

impl Named {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderBy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<DimensionOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<MetricOrder>,
    pub desc: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DimensionOrder {
    pub dimension_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricOrder {
    pub metric_name: String,
}

impl RunReportRequest {
    /// Daily series over `range`, one row per `date`.
    pub fn daily_series(range: &DateRange) -> Self {
        Self {
            date_ranges: vec![range.into()],
            dimensions: vec![Named::new("date")],
            metrics: SERIES_METRICS.iter().map(|m| Named::new(m)).collect(),
            order_bys: vec![OrderBy {
                dimension: Some(DimensionOrder {
                    dimension_name: "date".to_string(),
                }),
                metric: None,
                desc: false,
            }],
            limit: None,
        }
    }

    /// Sessions split by `dimension`, largest first.
    pub fn breakdown(range: &DateRange, dimension: &str, limit: Option<u32>) -> Self {
        Self {
            date_ranges: vec![range.into()],
            dimensions: vec![Named::new(dimension)],
            metrics: vec![Named::new(BREAKDOWN_METRIC)],
            order_bys: vec![OrderBy {
                dimension: None,
                metric: Some(MetricOrder {
                    metric_name: BREAKDOWN_METRIC.to_string(),
                }),
                desc: true,
            }],
            limit,
        }
    }
}

// ── Response ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunReportResponse {
    #[serde(default)]
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(default)]
    pub dimension_values: Vec<Cell>,
    #[serde(default)]
    pub metric_values: Vec<Cell>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Cell {
    #[serde(default)]
    pub value: String,
}

impl ReportRow {
    pub fn dimension(&self, idx: usize) -> Option<&str> {
        self.dimension_values.get(idx).map(|c| c.value.as_str())
    }

    /// Metric column `idx` as a count; absent or non-numeric cells are 0.
    pub fn metric(&self, idx: usize) -> u64 {
        self.metric_values
            .get(idx)
            .and_then(|c| c.value.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
            .map(|v| v.round() as u64)
            .unwrap_or(0)
    }
}

/// Error envelope returned with non-success statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<ApiErrorDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: String,
}

/// OAuth token endpoint response; `error` is set on failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_daily_series_body() {
        let body = serde_json::to_value(RunReportRequest::daily_series(&range())).unwrap();
        assert_eq!(body["dateRanges"][0]["startDate"], "2024-01-01");
        assert_eq!(body["dimensions"][0]["name"], "date");
        assert_eq!(body["metrics"][3]["name"], "sessions");
        assert_eq!(body["orderBys"][0]["dimension"]["dimensionName"], "date");
        assert!(body.get("limit").is_none());
    }

    #[test]
    fn test_breakdown_body() {
        let body =
            serde_json::to_value(RunReportRequest::breakdown(&range(), "pagePath", Some(10))).unwrap();
        assert_eq!(body["limit"], 10);
        assert_eq!(body["orderBys"][0]["metric"]["metricName"], "sessions");
        assert_eq!(body["orderBys"][0]["desc"], true);
    }

    #[test]
    fn test_row_metric_parsing() {
        let row: ReportRow = serde_json::from_value(serde_json::json!({
            "dimensionValues": [{"value": "20240101"}],
            "metricValues": [{"value": "12"}, {"value": "3.6"}, {"value": "n/a"}]
        }))
        .unwrap();
        assert_eq!(row.dimension(0), Some("20240101"));
        assert_eq!(row.metric(0), 12);
        assert_eq!(row.metric(1), 4);
        assert_eq!(row.metric(2), 0);
        assert_eq!(row.metric(9), 0);
    }

    #[test]
    fn test_empty_response_has_no_rows() {
        let resp: RunReportResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.rows.is_empty());
    }
}
