use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PulseError, Result};

/// Default upper bound for spreadsheet uploads (10 MiB).
pub const DEFAULT_MAX_SPREADSHEET_BYTES: u64 = 10 * 1024 * 1024;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Normalise social and web analytics exports into one comparable report
#[derive(Parser, Debug, Clone)]
#[command(
    name = "socialpulse",
    about = "Normalise social and web analytics exports into one comparable report",
    version
)]
pub struct Settings {
    /// Config file (defaults to ~/.socialpulse/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(long, global = true, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Log file path
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Parse export files and print what was recognised
    Inspect(InspectArgs),
    /// Ingest a manifest, aggregate the selected platforms and flag anomalies
    Report(ReportArgs),
    /// Fetch web analytics for a property and date range
    Fetch(FetchArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Files or directories to inspect
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Metric to assume for single-metric CSV exports
    #[arg(long, default_value = "reach")]
    pub metric: String,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// JSON manifest listing the export files per platform
    #[arg(long)]
    pub manifest: PathBuf,

    /// Platforms to combine (defaults to every platform in the manifest)
    #[arg(long, value_delimiter = ',')]
    pub platforms: Vec<String>,

    /// First day of the report (YYYY-MM-DD)
    #[arg(long, requires = "to")]
    pub from: Option<String>,

    /// Last day of the report (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    pub to: Option<String>,

    /// Also compare against the immediately preceding period of equal length
    #[arg(long, requires = "from")]
    pub compare_previous: bool,

    /// Override the day-over-baseline anomaly threshold (percent)
    #[arg(long)]
    pub spike_threshold: Option<f64>,

    /// Override the period comparison threshold (percent)
    #[arg(long)]
    pub comparison_threshold: Option<f64>,
}

#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Analytics property identifier
    #[arg(long)]
    pub property: String,

    /// First day (YYYY-MM-DD)
    #[arg(long)]
    pub from: String,

    /// Last day (YYYY-MM-DD)
    #[arg(long)]
    pub to: String,

    /// OAuth client id
    #[arg(long, env = "SOCIALPULSE_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    /// OAuth client secret
    #[arg(long, env = "SOCIALPULSE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// OAuth refresh token
    #[arg(long, env = "SOCIALPULSE_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Store the credentials and the latest access token in the config file
    #[arg(long)]
    pub save_credentials: bool,
}

impl Settings {
    /// Log level after applying `--debug`.
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            "DEBUG"
        } else {
            &self.log_level
        }
    }

    /// Config path from `--config`, falling back to the default location.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(PulseConfig::config_path)
    }
}

// ── PulseConfig (persisted) ────────────────────────────────────────────────────

/// OAuth credentials for the remote analytics API.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct AnalyticsCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// A still-valid access token, when one is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Override for the Data API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    /// Override for the OAuth token endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
}

impl AnalyticsCredentials {
    /// Merge persisted credentials with CLI/env values (CLI wins).
    ///
    /// Returns `None` when no refresh token is available from either source,
    /// i.e. the account is not connected.
    pub fn merged(
        persisted: Option<&AnalyticsCredentials>,
        client_id: Option<String>,
        client_secret: Option<String>,
        refresh_token: Option<String>,
    ) -> Option<AnalyticsCredentials> {
        let mut creds = persisted.cloned().unwrap_or_default();
        if let Some(v) = client_id {
            creds.client_id = v;
        }
        if let Some(v) = client_secret {
            creds.client_secret = v;
        }
        if let Some(v) = refresh_token {
            creds.refresh_token = v;
        }
        if creds.refresh_token.trim().is_empty() {
            return None;
        }
        Some(creds)
    }
}

/// Thresholds for the anomaly and comparison engine.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Trailing days averaged into the baseline.
    pub baseline_window_days: usize,
    /// Preceding days required before a day can be judged.
    pub min_baseline_points: usize,
    /// Relative deviation from the baseline that flags a day (percent).
    pub spike_threshold_pct: f64,
    /// Relative change between two reports that raises an alert (percent).
    pub comparison_threshold_pct: f64,
    /// Decreases at or beyond `threshold * critical_multiplier` are critical.
    pub critical_multiplier: f64,
}

impl AnomalyConfig {
    /// Reject thresholds that would make the anomaly engine meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.baseline_window_days == 0 {
            return Err(PulseError::Config(
                "anomaly.baseline_window_days must be at least 1".to_string(),
            ));
        }
        if self.min_baseline_points == 0 || self.min_baseline_points > self.baseline_window_days {
            return Err(PulseError::Config(
                "anomaly.min_baseline_points must be between 1 and baseline_window_days"
                    .to_string(),
            ));
        }
        if !is_positive(self.spike_threshold_pct) || !is_positive(self.comparison_threshold_pct) {
            return Err(PulseError::Config(
                "anomaly thresholds must be positive percentages".to_string(),
            ));
        }
        if !self.critical_multiplier.is_finite() || self.critical_multiplier < 1.0 {
            return Err(PulseError::Config(
                "anomaly.critical_multiplier must be at least 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_positive(pct: f64) -> bool {
    pct.is_finite() && pct > 0.0
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            baseline_window_days: 7,
            min_baseline_points: 3,
            spike_threshold_pct: 25.0,
            comparison_threshold_pct: 10.0,
            critical_multiplier: 2.0,
        }
    }
}

/// Persisted configuration at `~/.socialpulse/config.json`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PulseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics: Option<AnalyticsCredentials>,
    pub anomaly: AnomalyConfig,
    pub max_spreadsheet_bytes: u64,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            analytics: None,
            anomaly: AnomalyConfig::default(),
            max_spreadsheet_bytes: DEFAULT_MAX_SPREADSHEET_BYTES,
        }
    }
}

impl PulseConfig {
    /// Return the default path to the config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".socialpulse").join("config.json")
    }

    /// Load from `path`. A missing file yields the defaults; an unreadable or
    /// malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no config at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| PulseError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: PulseConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Atomically write the config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;

        // Write to a temp file then rename for atomicity.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Validate the anomaly thresholds and the upload bound.
    pub fn validate(&self) -> Result<()> {
        self.anomaly.validate()?;
        if self.max_spreadsheet_bytes == 0 {
            return Err(PulseError::Config(
                "max_spreadsheet_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp_config_path(tmp: &TempDir) -> PathBuf {
        PulseConfig::config_path_in(tmp.path())
    }

    #[test]
    fn test_config_save_load_round_trip() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let config = PulseConfig {
            analytics: Some(AnalyticsCredentials {
                client_id: "cid".to_string(),
                client_secret: "secret".to_string(),
                refresh_token: "refresh".to_string(),
                ..Default::default()
            }),
            anomaly: AnomalyConfig {
                spike_threshold_pct: 40.0,
                ..Default::default()
            },
            max_spreadsheet_bytes: 1024,
        };

        config.save_to(&path).expect("save");
        let loaded = PulseConfig::load_from(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_default_when_missing() {
        let tmp = TempDir::new().expect("tempdir");
        let loaded = PulseConfig::load_from(&tmp_config_path(&tmp)).expect("load");
        assert_eq!(loaded, PulseConfig::default());
        assert_eq!(loaded.max_spreadsheet_bytes, DEFAULT_MAX_SPREADSHEET_BYTES);
    }

    #[test]
    fn test_config_partial_file_fills_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"anomaly": {"spike_threshold_pct": 50.0}}"#).unwrap();

        let loaded = PulseConfig::load_from(&path).expect("load");
        assert_eq!(loaded.anomaly.spike_threshold_pct, 50.0);
        assert_eq!(loaded.anomaly.baseline_window_days, 7);
        assert!(loaded.analytics.is_none());
    }

    #[test]
    fn test_config_malformed_is_error() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            PulseConfig::load_from(&path),
            Err(PulseError::JsonParse(_))
        ));
    }

    #[test]
    fn test_config_rejects_bad_thresholds() {
        let mut config = PulseConfig::default();
        config.anomaly.min_baseline_points = 10;
        assert!(config.validate().is_err());

        let mut config = PulseConfig::default();
        config.anomaly.spike_threshold_pct = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_anomaly_config_rejects_negative_and_nan() {
        assert!(AnomalyConfig::default().validate().is_ok());

        let negative = AnomalyConfig {
            spike_threshold_pct: -5.0,
            ..AnomalyConfig::default()
        };
        assert!(matches!(negative.validate(), Err(PulseError::Config(_))));

        let nan = AnomalyConfig {
            comparison_threshold_pct: f64::NAN,
            ..AnomalyConfig::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_settings_fetch_save_credentials_flag() {
        let settings = Settings::parse_from([
            "socialpulse",
            "fetch",
            "--property",
            "123",
            "--from",
            "2024-01-01",
            "--to",
            "2024-01-31",
            "--save-credentials",
        ]);
        match settings.command {
            Command::Fetch(args) => {
                assert_eq!(args.property, "123");
                assert!(args.save_credentials);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_credentials_merge_cli_wins() {
        let persisted = AnalyticsCredentials {
            client_id: "file-id".to_string(),
            client_secret: "file-secret".to_string(),
            refresh_token: "file-refresh".to_string(),
            ..Default::default()
        };
        let merged =
            AnalyticsCredentials::merged(Some(&persisted), Some("cli-id".to_string()), None, None)
                .expect("connected");
        assert_eq!(merged.client_id, "cli-id");
        assert_eq!(merged.client_secret, "file-secret");
        assert_eq!(merged.refresh_token, "file-refresh");
    }

    #[test]
    fn test_credentials_without_refresh_token_not_connected() {
        assert!(AnalyticsCredentials::merged(None, Some("id".to_string()), None, None).is_none());
    }

    #[test]
    fn test_settings_report_parsing() {
        let settings = Settings::parse_from([
            "socialpulse",
            "report",
            "--manifest",
            "m.json",
            "--platforms",
            "instagram,facebook",
            "--from",
            "2024-01-01",
            "--to",
            "2024-01-31",
            "--compare-previous",
        ]);
        match settings.command {
            Command::Report(args) => {
                assert_eq!(args.manifest, PathBuf::from("m.json"));
                assert_eq!(args.platforms, vec!["instagram", "facebook"]);
                assert_eq!(args.from.as_deref(), Some("2024-01-01"));
                assert!(args.compare_previous);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_settings_debug_overrides_log_level() {
        let settings = Settings::parse_from(["socialpulse", "--debug", "inspect", "a.csv"]);
        assert_eq!(settings.effective_log_level(), "DEBUG");
        let settings = Settings::parse_from(["socialpulse", "inspect", "a.csv"]);
        assert_eq!(settings.effective_log_level(), "INFO");
    }

    #[test]
    fn test_settings_inspect_default_metric() {
        let settings = Settings::parse_from(["socialpulse", "inspect", "a.csv", "b.xlsx"]);
        match settings.command {
            Command::Inspect(args) => {
                assert_eq!(args.paths.len(), 2);
                assert_eq!(args.metric, "reach");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
