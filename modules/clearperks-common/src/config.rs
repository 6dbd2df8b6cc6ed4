use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ClearPerksError;

/// Hard per-request token limit of the push provider.
pub const MAX_PUSH_BATCH_SIZE: usize = 500;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Push delivery
    pub push_enabled: bool,
    pub fcm_project_id: Option<String>,
    pub fcm_access_token: Option<String>,
    pub fcm_endpoint: Option<String>,
    pub push_batch_size: usize,
    pub push_timeout: Duration,

    // Scoring
    pub freshness_max_days: i64,

    // Workflows
    pub trend_notify_threshold: f64,
    pub news_lookback_hours: i64,
    pub news_per_category_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            push_enabled: true,
            fcm_project_id: None,
            fcm_access_token: None,
            fcm_endpoint: None,
            push_batch_size: MAX_PUSH_BATCH_SIZE,
            push_timeout: Duration::from_secs(10),
            freshness_max_days: 30,
            trend_notify_threshold: 8.0,
            news_lookback_hours: 50,
            news_per_category_limit: 10,
        }
    }
}

impl Config {
    /// Load configuration from the environment (and `.env` if present).
    /// Every variable is optional; malformed numbers are an error.
    pub fn from_env() -> Result<Self, ClearPerksError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            push_enabled: parsed_env("PUSH_ENABLED")?.unwrap_or(defaults.push_enabled),
            fcm_project_id: optional_env("FCM_PROJECT_ID"),
            fcm_access_token: optional_env("FCM_ACCESS_TOKEN"),
            fcm_endpoint: optional_env("FCM_ENDPOINT"),
            push_batch_size: parsed_env::<usize>("PUSH_BATCH_SIZE")?
                .unwrap_or(defaults.push_batch_size)
                .clamp(1, MAX_PUSH_BATCH_SIZE),
            push_timeout: parsed_env::<u64>("PUSH_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.push_timeout),
            freshness_max_days: parsed_env("FRESHNESS_MAX_DAYS")?
                .unwrap_or(defaults.freshness_max_days),
            trend_notify_threshold: parsed_env("TREND_NOTIFY_THRESHOLD")?
                .unwrap_or(defaults.trend_notify_threshold),
            news_lookback_hours: parsed_env("NEWS_LOOKBACK_HOURS")?
                .unwrap_or(defaults.news_lookback_hours),
            news_per_category_limit: parsed_env("NEWS_PER_CATEGORY_LIMIT")?
                .unwrap_or(defaults.news_per_category_limit),
        };

        if config.freshness_max_days <= 0 {
            return Err(ClearPerksError::Config(
                "FRESHNESS_MAX_DAYS must be positive".to_string(),
            ));
        }

        Ok(config)
    }

    /// True when push is enabled and a provider can be built.
    pub fn push_configured(&self) -> bool {
        self.push_enabled && self.fcm_project_id.is_some() && self.fcm_access_token.is_some()
    }

    /// Log the loaded config with secrets redacted.
    pub fn log_redacted(&self) {

        tracing::info!("Config loaded:");
        tracing::info!("  PUSH_ENABLED: {}", self.push_enabled);
        tracing::info!(
            "  FCM_PROJECT_ID: {}",
            self.fcm_project_id.as_deref().unwrap_or("<not set>")
        );
        tracing::info!("  FCM_ACCESS_TOKEN: {}", preview_secret(&self.fcm_access_token));
        tracing::info!("  PUSH_BATCH_SIZE: {}", self.push_batch_size);
        tracing::info!("  PUSH_TIMEOUT_SECS: {}", self.push_timeout.as_secs());
    }
}

/// First four characters and the length, never the whole secret.
fn preview_secret(val: &Option<String>) -> String {
    match val {
        Some(v) if !v.is_empty() => {
            let head: String = v.chars().take(4).collect();
            format!("{}...({} chars)", head, v.chars().count())
        }
        _ => "<not set>".to_string(),
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_env<T: FromStr>(key: &str) -> Result<Option<T>, ClearPerksError> {
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ClearPerksError::Config(format!("{key} has invalid value: {raw}"))),
        None => Ok(None),
    }
}
