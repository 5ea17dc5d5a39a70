use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::warn;

use contest_rank_sync::constants::{
    AUTO_REFRESH_INTERVAL_MS, DEFAULT_BASE_URL, DEFAULT_CONTEST_STATUS_POLL_MS,
    DEFAULT_HEARTBEAT_MS, DEFAULT_PORT, DEFAULT_PREFERENCES_PATH, DEFAULT_REQUEST_TIMEOUT_MS,
};
use contest_rank_sync::util::parse_flag;
use contest_rank_sync::RuleType;

#[derive(Clone)]
pub(crate) struct Config {
    pub(crate) base_url: String,
    pub(crate) session_id: Option<String>,
    pub(crate) contest_id: String,
    pub(crate) rule_type: RuleType,
    pub(crate) port: u16,
    pub(crate) request_timeout: Duration,
    pub(crate) refresh_interval: Duration,
    pub(crate) status_poll_interval: Duration,
    pub(crate) heartbeat: Duration,
    pub(crate) discard_stale_responses: bool,
    pub(crate) auto_refresh: bool,
    pub(crate) preferences_path: PathBuf,
}

impl Config {
    pub(crate) fn from_env() -> Result<Self> {
        let base_url = read_env_first(&["OJ_BASE_URL", "OJ_API_URL"]).unwrap_or_else(|| {
            warn!("OJ_BASE_URL not set; defaulting to {}", DEFAULT_BASE_URL);
            DEFAULT_BASE_URL.to_string()
        });
        let session_id = read_env_first(&["OJ_SESSION_ID"]);
        let contest_id =
            read_env_first(&["CONTEST_ID"]).ok_or_else(|| anyhow!("CONTEST_ID must be set"))?;

        let rule_type = match read_env_first(&["CONTEST_RULE_TYPE"]) {
            Some(value) => value.parse::<RuleType>().unwrap_or_else(|err| {
                warn!("{}; defaulting to ACM", err);
                RuleType::Acm
            }),
            None => RuleType::Acm,
        };

        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let request_timeout = read_interval(&["OJ_TIMEOUT_MS"], DEFAULT_REQUEST_TIMEOUT_MS);
        let refresh_interval = read_interval(&["RANK_REFRESH_MS"], AUTO_REFRESH_INTERVAL_MS);
        let status_poll_interval =
            read_interval(&["CONTEST_STATUS_POLL_MS"], DEFAULT_CONTEST_STATUS_POLL_MS);
        let heartbeat = read_interval(&["SSE_HEARTBEAT_MS"], DEFAULT_HEARTBEAT_MS);

        let discard_stale_responses = read_env_first(&["DISCARD_STALE_RESPONSES"])
            .map(|value| parse_flag(&value))
            .unwrap_or(false);
        let auto_refresh = read_env_first(&["AUTO_REFRESH"])
            .map(|value| parse_flag(&value))
            .unwrap_or(false);

        let preferences_path = read_env_first(&["RANK_PREFERENCES_PATH"])
            .unwrap_or_else(|| DEFAULT_PREFERENCES_PATH.to_string())
            .into();

        Ok(Self {
            base_url,
            session_id,
            contest_id,
            rule_type,
            port,
            request_timeout,
            refresh_interval,
            status_poll_interval,
            heartbeat,
            discard_stale_responses,
            auto_refresh,
            preferences_path,
        })
    }
}

fn read_interval(keys: &[&str], default_ms: u64) -> Duration {
    Duration::from_millis(parse_interval_ms(read_env_first(keys).as_deref(), default_ms))
}

fn parse_interval_ms(value: Option<&str>, default_ms: u64) -> u64 {
    value
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default_ms)
}

pub(crate) fn read_env_first(keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Ok(value) = env::var(key) {
            let trimmed = value.trim().to_string();
            if !trimmed.is_empty() {
                return Some(trimmed);
            }
        }
    }
    None
}
