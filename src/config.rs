use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_RECONNECT_BASE_MS: u64 = 1_000;
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 10_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CACHE_TTL_MS: u64 = 10_000;
pub const DEFAULT_PLAYBACK_BASE_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_PLAYBACK_TICK_MS: u64 = 16;
pub const DEFAULT_WINDOW_BATCH_SIZE: usize = 1_000;
pub const DEFAULT_WINDOW_OVERSCAN: usize = 5;
pub const MIN_RECONNECT_BASE_MS: u64 = 10;
pub const MAX_RECONNECT_BASE_MS: u64 = 60_000;
pub const MAX_RECONNECT_MAX_MS: u64 = 300_000;
pub const MIN_CONNECT_TIMEOUT_MS: u64 = 100;
pub const MAX_CONNECT_TIMEOUT_MS: u64 = 120_000;
pub const MAX_CACHE_TTL_MS: u64 = 3_600_000;
pub const MIN_PLAYBACK_BASE_INTERVAL_MS: u64 = 1;
pub const MAX_PLAYBACK_BASE_INTERVAL_MS: u64 = 60_000;
pub const MIN_PLAYBACK_TICK_MS: u64 = 1;
pub const MAX_PLAYBACK_TICK_MS: u64 = 1_000;
pub const MIN_WINDOW_BATCH_SIZE: usize = 1;
pub const MAX_WINDOW_BATCH_SIZE: usize = 1_000_000;
pub const MAX_WINDOW_OVERSCAN: usize = 100_000;

const ENV_STREAM_URL: &str = "TELEMETRY_STREAM_URL";
const ENV_API_BASE_URL: &str = "TELEMETRY_API_BASE_URL";
const ENV_API_TOKEN: &str = "TELEMETRY_API_TOKEN";
const ENV_API_TOKEN_REQUIRED: &str = "TELEMETRY_API_TOKEN_REQUIRED";
const ENV_RECONNECT_BASE_MS: &str = "TELEMETRY_RECONNECT_BASE_MS";
const ENV_RECONNECT_MAX_MS: &str = "TELEMETRY_RECONNECT_MAX_MS";
const ENV_CONNECT_TIMEOUT_MS: &str = "TELEMETRY_CONNECT_TIMEOUT_MS";
const ENV_CACHE_TTL_MS: &str = "TELEMETRY_CACHE_TTL_MS";
const ENV_PLAYBACK_BASE_INTERVAL_MS: &str = "TELEMETRY_PLAYBACK_BASE_INTERVAL_MS";
const ENV_PLAYBACK_TICK_MS: &str = "TELEMETRY_PLAYBACK_TICK_MS";
const ENV_WINDOW_BATCH_SIZE: &str = "TELEMETRY_WINDOW_BATCH_SIZE";
const ENV_WINDOW_OVERSCAN: &str = "TELEMETRY_WINDOW_OVERSCAN";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncArgs {
    pub stream_url: Option<String>,
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
    pub api_token_required: Option<bool>,
    pub reconnect_base_ms: Option<u64>,
    pub reconnect_max_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub cache_ttl_ms: Option<u64>,
    pub playback_base_interval_ms: Option<u64>,
    pub playback_tick_ms: Option<u64>,
    pub window_batch_size: Option<usize>,
    pub window_overscan: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub stream_url: Option<String>,
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
    pub connect_timeout_ms: u64,
    pub cache_ttl_ms: u64,
    pub playback_base_interval_ms: u64,
    pub playback_tick_ms: u64,
    pub window_batch_size: usize,
    pub window_overscan: usize,
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_env_parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>, SyncError> {
    match read_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| SyncError::Configuration(format!("{key} has an invalid value '{raw}'"))),
        None => Ok(None),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

pub(crate) fn validate_stream_url(url: &str) -> Result<(), SyncError> {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(())
    } else {
        Err(SyncError::Configuration(format!(
            "stream url '{url}' must use ws:// or wss://"
        )))
    }
}

pub(crate) fn validate_http_url(url: &str) -> Result<(), SyncError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(SyncError::Configuration(format!(
            "api base url '{url}' must use http:// or https://"
        )))
    }
}

impl SyncArgs {
    pub fn from_env() -> Result<Self, SyncError> {
        Ok(Self {
            stream_url: read_env(ENV_STREAM_URL),
            api_base_url: read_env(ENV_API_BASE_URL),
            api_token: read_env(ENV_API_TOKEN),
            api_token_required: read_env_parsed(ENV_API_TOKEN_REQUIRED)?,
            reconnect_base_ms: read_env_parsed(ENV_RECONNECT_BASE_MS)?,
            reconnect_max_ms: read_env_parsed(ENV_RECONNECT_MAX_MS)?,
            connect_timeout_ms: read_env_parsed(ENV_CONNECT_TIMEOUT_MS)?,
            cache_ttl_ms: read_env_parsed(ENV_CACHE_TTL_MS)?,
            playback_base_interval_ms: read_env_parsed(ENV_PLAYBACK_BASE_INTERVAL_MS)?,
            playback_tick_ms: read_env_parsed(ENV_PLAYBACK_TICK_MS)?,
            window_batch_size: read_env_parsed(ENV_WINDOW_BATCH_SIZE)?,
            window_overscan: read_env_parsed(ENV_WINDOW_OVERSCAN)?,
        })
    }

    pub fn normalize(self) -> Result<SyncConfig, SyncError> {
        let stream_url = non_empty(self.stream_url);
        if let Some(url) = stream_url.as_deref() {
            validate_stream_url(url)?;
        }

        let api_base_url = non_empty(self.api_base_url)
            .ok_or_else(|| SyncError::Configuration("apiBaseUrl is required".to_string()))?
            .trim_end_matches('/')
            .to_string();
        validate_http_url(&api_base_url)?;

        let api_token = non_empty(self.api_token);
        if self.api_token_required.unwrap_or(false) && api_token.is_none() {
            return Err(SyncError::Configuration(
                "apiToken is required but was not provided".to_string(),
            ));
        }

        let reconnect_base_ms = self.reconnect_base_ms.unwrap_or(DEFAULT_RECONNECT_BASE_MS);
        if !(MIN_RECONNECT_BASE_MS..=MAX_RECONNECT_BASE_MS).contains(&reconnect_base_ms) {
            return Err(SyncError::InvalidArgument(format!(
                "reconnectBaseMs must be between {MIN_RECONNECT_BASE_MS} and {MAX_RECONNECT_BASE_MS}"
            )));
        }

        let reconnect_max_ms = self.reconnect_max_ms.unwrap_or(DEFAULT_RECONNECT_MAX_MS);
        if !(reconnect_base_ms..=MAX_RECONNECT_MAX_MS).contains(&reconnect_max_ms) {
            return Err(SyncError::InvalidArgument(format!(
                "reconnectMaxMs must be between reconnectBaseMs ({reconnect_base_ms}) and {MAX_RECONNECT_MAX_MS}"
            )));
        }

        let connect_timeout_ms = self
            .connect_timeout_ms
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS);
        if !(MIN_CONNECT_TIMEOUT_MS..=MAX_CONNECT_TIMEOUT_MS).contains(&connect_timeout_ms) {
            return Err(SyncError::InvalidArgument(format!(
                "connectTimeoutMs must be between {MIN_CONNECT_TIMEOUT_MS} and {MAX_CONNECT_TIMEOUT_MS}"
            )));
        }

        let cache_ttl_ms = self.cache_ttl_ms.unwrap_or(DEFAULT_CACHE_TTL_MS);
        if cache_ttl_ms > MAX_CACHE_TTL_MS {
            return Err(SyncError::InvalidArgument(format!(
                "cacheTtlMs must be at most {MAX_CACHE_TTL_MS}"
            )));
        }

        let playback_base_interval_ms = self
            .playback_base_interval_ms
            .unwrap_or(DEFAULT_PLAYBACK_BASE_INTERVAL_MS);
        if !(MIN_PLAYBACK_BASE_INTERVAL_MS..=MAX_PLAYBACK_BASE_INTERVAL_MS)
            .contains(&playback_base_interval_ms)
        {
            return Err(SyncError::InvalidArgument(format!(
                "playbackBaseIntervalMs must be between {MIN_PLAYBACK_BASE_INTERVAL_MS} and {MAX_PLAYBACK_BASE_INTERVAL_MS}"
            )));
        }

        let playback_tick_ms = self.playback_tick_ms.unwrap_or(DEFAULT_PLAYBACK_TICK_MS);
        if !(MIN_PLAYBACK_TICK_MS..=MAX_PLAYBACK_TICK_MS).contains(&playback_tick_ms) {
            return Err(SyncError::InvalidArgument(format!(
                "playbackTickMs must be between {MIN_PLAYBACK_TICK_MS} and {MAX_PLAYBACK_TICK_MS}"
            )));
        }

        let window_batch_size = self.window_batch_size.unwrap_or(DEFAULT_WINDOW_BATCH_SIZE);
        if !(MIN_WINDOW_BATCH_SIZE..=MAX_WINDOW_BATCH_SIZE).contains(&window_batch_size) {
            return Err(SyncError::InvalidArgument(format!(
                "windowBatchSize must be between {MIN_WINDOW_BATCH_SIZE} and {MAX_WINDOW_BATCH_SIZE}"
            )));
        }

        let window_overscan = self.window_overscan.unwrap_or(DEFAULT_WINDOW_OVERSCAN);
        if window_overscan > MAX_WINDOW_OVERSCAN {
            return Err(SyncError::InvalidArgument(format!(
                "windowOverscan must be at most {MAX_WINDOW_OVERSCAN}"
            )));
        }

        Ok(SyncConfig {
            stream_url,
            api_base_url,
            api_token,
            reconnect_base_ms,
            reconnect_max_ms,
            connect_timeout_ms,
            cache_ttl_ms,
            playback_base_interval_ms,
            playback_tick_ms,
            window_batch_size,
            window_overscan,
        })
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, SyncError> {
        SyncArgs::from_env()?.normalize()
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn playback_base_interval(&self) -> Duration {
        Duration::from_millis(self.playback_base_interval_ms)
    }

    pub fn playback_tick(&self) -> Duration {
        Duration::from_millis(self.playback_tick_ms)
    }
}
