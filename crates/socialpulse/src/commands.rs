//! Subcommand bodies. Each returns the JSON document `main` prints.

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use pulse_core::formatting::{format_compact, format_day_label, format_signed_percent};
use pulse_core::models::{
    apply_exclusive_selection, AggregatedReport, CombinedMetric, DateRange, Metric, Platform,
};
use pulse_core::settings::{
    AnalyticsCredentials, AnomalyConfig, FetchArgs, InspectArgs, PulseConfig, ReportArgs,
};
use pulse_core::stats::period_over_period_trend;
use pulse_data::anomaly::{compare_reports, dedupe_alerts, detect_anomalies, merge_alerts};
use pulse_data::CrossPlatformAggregator;
use pulse_runtime::ingest::{detect_kind, discover_sources, inspect_file, FileSummary};
use pulse_runtime::{ingest_manifest, AnalyticsClient, AnalyticsConfig, AnalyticsError, Manifest};
use serde_json::{json, Value};
use tracing::info;

// ── inspect ───────────────────────────────────────────────────────────────────

pub fn inspect(args: &InspectArgs, config: &PulseConfig) -> Result<Value> {
    let metric = Metric::from_str(&args.metric)?;

    let mut files = Vec::new();
    for path in &args.paths {
        for file in discover_sources(path) {
            let summary = inspect_file(&file, metric, config.max_spreadsheet_bytes)
                .unwrap_or_else(|e| FileSummary {
                    kind: detect_kind(&file),
                    path: file.clone(),
                    metrics: Vec::new(),
                    content_items: 0,
                    rejected: Some(e.to_string()),
                });
            files.push(summary);
        }
    }

    info!(files = files.len(), "inspection complete");
    Ok(json!({ "files": files }))
}

// ── report ────────────────────────────────────────────────────────────────────

pub async fn report(args: &ReportArgs, config: &PulseConfig) -> Result<Value> {
    let manifest = Manifest::load(&args.manifest)?;
    let anomaly = anomaly_config(args, &config.anomaly)?;

    let range = match (&args.from, &args.to) {
        (Some(from), Some(to)) => Some(DateRange::parse(from, to)?),
        _ => None,
    };

    let requested = if args.platforms.is_empty() {
        manifest.platforms()
    } else {
        parse_platforms(&args.platforms)?
    };
    let selected = apply_exclusive_selection(&requested);

    let outcome = ingest_manifest(&manifest, config).await?;
    let current = CrossPlatformAggregator::aggregate(&outcome.bundle, &selected, range);
    let anomalies = detect_anomalies(&current, &anomaly);

    let (alerts, previous) = match (args.compare_previous, range) {
        (true, Some(range)) => {
            let previous =
                CrossPlatformAggregator::aggregate(&outcome.bundle, &selected, Some(range.previous()));
            let comparisons = compare_reports(&current, &previous, &anomaly);
            (merge_alerts(anomalies, comparisons), Some(previous))
        }
        _ => (dedupe_alerts(anomalies), None),
    };

    Ok(json!({
        "selected_platforms": selected,
        "report": current,
        "summary": summary_lines(&current, previous.as_ref()),
        "previous": previous,
        "alerts": alerts,
        "rejected": outcome.rejected,
    }))
}

/// Apply the CLI threshold overrides and re-validate the result.
fn anomaly_config(args: &ReportArgs, base: &AnomalyConfig) -> Result<AnomalyConfig> {
    let mut anomaly = base.clone();
    if let Some(pct) = args.spike_threshold {
        anomaly.spike_threshold_pct = pct;
    }
    if let Some(pct) = args.comparison_threshold {
        anomaly.comparison_threshold_pct = pct;
    }
    anomaly.validate()?;
    Ok(anomaly)
}

fn parse_platforms(names: &[String]) -> Result<Vec<Platform>> {
    names
        .iter()
        .filter(|n| !n.trim().is_empty())
        .map(|n| Platform::from_str(n).with_context(|| format!("in --platforms value '{n}'")))
        .collect()
}

/// One human-readable line per combined metric, plus the covered days.
fn summary_lines(current: &AggregatedReport, previous: Option<&AggregatedReport>) -> Value {
    let mut lines = serde_json::Map::new();
    for metric in CombinedMetric::ALL {
        let total = current.totals.get(metric);
        let mut line = format_compact(total);
        if let Some(previous) = previous {
            let change = period_over_period_trend(total, previous.totals.get(metric));
            line.push_str(&format!(" ({} vs previous period)", format_signed_percent(change)));
        }
        lines.insert(metric.label().to_string(), Value::String(line));
    }
    if let (Some(first), Some(last)) = (current.daily.first(), current.daily.last()) {
        lines.insert(
            "Days".to_string(),
            Value::String(format!(
                "{} to {}",
                format_day_label(first.date),
                format_day_label(last.date)
            )),
        );
    }
    Value::Object(lines)
}

// ── fetch ─────────────────────────────────────────────────────────────────────

pub async fn fetch(args: &FetchArgs, config: &PulseConfig, config_path: &Path) -> Result<Value> {
    let range = DateRange::parse(&args.from, &args.to)?;
    let credentials = AnalyticsCredentials::merged(
        config.analytics.as_ref(),
        args.client_id.clone(),
        args.client_secret.clone(),
        args.refresh_token.clone(),
    )
    .ok_or_else(|| AnalyticsError::NotConnected("no refresh token configured".to_string()))?;

    let client = AnalyticsClient::new(AnalyticsConfig::from(&credentials))?;
    let data = client.fetch_platform_data(&args.property, range).await?;

    if args.save_credentials {
        let access_token = client.access_token().await;
        save_credentials(config, credentials, access_token, config_path)?;
    }

    Ok(json!({
        "platform": Platform::Web,
        "property": args.property,
        "date_range": range.label(),
        "data": data,
    }))
}

/// Write `credentials` into a copy of `config` and persist it to `path`.
fn save_credentials(
    config: &PulseConfig,
    mut credentials: AnalyticsCredentials,
    access_token: Option<String>,
    path: &Path,
) -> Result<()> {
    if access_token.is_some() {
        credentials.access_token = access_token;
    }
    let updated = PulseConfig {
        analytics: Some(credentials),
        ..config.clone()
    };
    updated
        .save_to(path)
        .with_context(|| format!("saving credentials to {}", path.display()))?;
    info!("Saved analytics credentials to {}", path.display());
    Ok(())
}

/// True when `err` means the analytics account must be re-authenticated.
pub fn needs_reauth(err: &anyhow::Error) -> bool {
    err.downcast_ref::<AnalyticsError>()
        .is_some_and(AnalyticsError::is_recoverable)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn report_args(manifest: PathBuf) -> ReportArgs {
        ReportArgs {
            manifest,
            platforms: vec![],
            from: None,
            to: None,
            compare_previous: false,
            spike_threshold: None,
            comparison_threshold: None,
        }
    }

    fn sample_manifest(dir: &Path) -> PathBuf {
        write(
            dir,
            "fb_reach.csv",
            "Fecha,Primary\n2024-01-01,100\n2024-01-02,100\n2024-01-03,100\n2024-01-04,100\n2024-01-05,400\n",
        );
        write(dir, "ig_reach.csv", "Fecha,Primary\n2024-01-01,50\n");
        write(dir, "web_visits.csv", "Date,Value\n2024-01-01,7\n");
        write(
            dir,
            "manifest.json",
            &json!({"sources": [
                {"platform": "facebook", "kind": "metric_csv", "metric": "reach", "path": "fb_reach.csv"},
                {"platform": "instagram", "kind": "metric_csv", "metric": "reach", "path": "ig_reach.csv"},
                {"platform": "web", "kind": "metric_csv", "metric": "visits", "path": "web_visits.csv"}
            ]})
            .to_string(),
        )
    }

    #[tokio::test]
    async fn test_report_combines_selected_platforms() {
        let tmp = TempDir::new().unwrap();
        let mut args = report_args(sample_manifest(tmp.path()));
        args.platforms = vec!["facebook".into(), "ig".into()];

        let out = report(&args, &PulseConfig::default()).await.unwrap();
        assert_eq!(out["report"]["totals"]["reach"], 850);
        assert_eq!(out["report"]["date_range"], "all");
        assert_eq!(out["selected_platforms"], json!(["facebook", "instagram"]));

        let alerts = out["alerts"].as_array().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0]["id"], "anomaly:reach:2024-01-05");
        assert_eq!(out["summary"]["Days"], "01 Jan 2024 to 05 Jan 2024");
    }

    #[tokio::test]
    async fn test_report_exclusive_platform_wins() {
        let tmp = TempDir::new().unwrap();
        let args = report_args(sample_manifest(tmp.path()));

        let out = report(&args, &PulseConfig::default()).await.unwrap();
        assert_eq!(out["selected_platforms"], json!(["web"]));
        assert_eq!(out["report"]["totals"]["reach"], 0);
    }

    #[tokio::test]
    async fn test_report_compare_previous_range() {
        let tmp = TempDir::new().unwrap();
        let mut args = report_args(sample_manifest(tmp.path()));
        args.platforms = vec!["facebook".into()];
        args.from = Some("2024-01-04".into());
        args.to = Some("2024-01-05".into());
        args.compare_previous = true;

        let out = report(&args, &PulseConfig::default()).await.unwrap();
        assert_eq!(out["report"]["totals"]["reach"], 500);
        assert_eq!(out["previous"]["date_range"], "2024-01-02..2024-01-03");

        let alerts = out["alerts"].as_array().unwrap();
        assert!(alerts.iter().any(|a| a["id"]
            == "comparison:reach:2024-01-04..2024-01-05:2024-01-02..2024-01-03"
            && a["kind"] == "growth"));
        assert_eq!(out["summary"]["Reach"], "500 (+150% vs previous period)");
    }

    #[tokio::test]
    async fn test_report_rejects_unknown_platform() {
        let tmp = TempDir::new().unwrap();
        let mut args = report_args(sample_manifest(tmp.path()));
        args.platforms = vec!["myspace".into()];
        let err = report(&args, &PulseConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("myspace"));
    }

    #[test]
    fn test_inspect_directory() {
        let tmp = TempDir::new().unwrap();
        sample_manifest(tmp.path());
        let args = InspectArgs {
            paths: vec![tmp.path().to_path_buf()],
            metric: "reach".into(),
        };
        let out = inspect(&args, &PulseConfig::default()).unwrap();
        let files = out["files"].as_array().unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files[0]["kind"], "metric_csv");
        assert_eq!(files[0]["metrics"][0]["stats"]["total"], 800);
    }

    #[tokio::test]
    async fn test_fetch_without_credentials_needs_reauth() {
        let args = FetchArgs {
            property: "123".into(),
            from: "2024-01-01".into(),
            to: "2024-01-31".into(),
            client_id: None,
            client_secret: None,
            refresh_token: None,
            save_credentials: false,
        };
        let tmp = TempDir::new().unwrap();
        let err = fetch(&args, &PulseConfig::default(), &tmp.path().join("config.json"))
            .await
            .unwrap_err();
        assert!(needs_reauth(&err));
    }

    #[test]
    fn test_save_credentials_keeps_other_settings() {
        let tmp = TempDir::new().unwrap();
        let path = PulseConfig::config_path_in(tmp.path());
        let config = PulseConfig {
            max_spreadsheet_bytes: 2048,
            ..PulseConfig::default()
        };
        let credentials = AnalyticsCredentials {
            client_id: "cid".into(),
            client_secret: "secret".into(),
            refresh_token: "refresh".into(),
            ..Default::default()
        };

        save_credentials(&config, credentials, Some("fresh-token".into()), &path).unwrap();

        let saved = PulseConfig::load_from(&path).unwrap();
        assert_eq!(saved.max_spreadsheet_bytes, 2048);
        let analytics = saved.analytics.expect("credentials persisted");
        assert_eq!(analytics.refresh_token, "refresh");
        assert_eq!(analytics.access_token.as_deref(), Some("fresh-token"));
    }

    #[test]
    fn test_anomaly_overrides() {
        let mut args = report_args(PathBuf::from("m.json"));
        args.spike_threshold = Some(40.0);
        let config = anomaly_config(&args, &AnomalyConfig::default()).unwrap();
        assert_eq!(config.spike_threshold_pct, 40.0);
        assert_eq!(config.comparison_threshold_pct, 10.0);
    }

    #[test]
    fn test_negative_threshold_override_rejected() {
        let mut args = report_args(PathBuf::from("m.json"));
        args.spike_threshold = Some(-5.0);
        let err = anomaly_config(&args, &AnomalyConfig::default()).unwrap_err();
        assert!(err.to_string().contains("positive"), "{err}");
    }

    #[tokio::test]
    async fn test_report_rejects_zero_comparison_threshold() {
        let tmp = TempDir::new().unwrap();
        let mut args = report_args(sample_manifest(tmp.path()));
        args.comparison_threshold = Some(0.0);
        assert!(report(&args, &PulseConfig::default()).await.is_err());
    }
}
