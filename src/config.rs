//! Runtime configuration loaded from `REPORTAVIAS_*` environment variables.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::models::location::{BoundingBox, COSTA_RICA};

pub const API_URL_ENV: &str = "REPORTAVIAS_API_URL";
pub const GEOCODER_URL_ENV: &str = "REPORTAVIAS_GEOCODER_URL";
pub const USER_AGENT_ENV: &str = "REPORTAVIAS_USER_AGENT";
pub const COUNTRY_CODE_ENV: &str = "REPORTAVIAS_COUNTRY_CODE";
pub const COUNTRY_NAME_ENV: &str = "REPORTAVIAS_COUNTRY_NAME";
pub const POLL_SECS_ENV: &str = "REPORTAVIAS_POLL_SECS";
pub const TIMEOUT_SECS_ENV: &str = "REPORTAVIAS_TIMEOUT_SECS";
pub const STORAGE_QUOTA_ENV: &str = "REPORTAVIAS_STORAGE_QUOTA";
pub const DB_PATH_ENV: &str = "REPORTAVIAS_DB_PATH";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub geocoder_url: String,
    pub user_agent: String,
    pub country_code: String,
    pub country_name: String,
    pub region: BoundingBox,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    /// Bytes available to the local mirror.
    pub storage_quota: usize,
    pub db_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3001".to_string(),
            geocoder_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "ReportaViasCR/1.0".to_string(),
            country_code: "cr".to_string(),
            country_name: "Costa Rica".to_string(),
            region: COSTA_RICA,
            poll_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            storage_quota: 5 * 1024 * 1024,
            db_path: "reportavias.db".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let text = |name: &str, default: String| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };
        let number = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(name).map(|v| v.trim().to_string()) {
                None => Ok(default),
                Some(v) if v.is_empty() => Ok(default),
                Some(v) => v
                    .parse::<u64>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or(ConfigError::InvalidNumber { name, value: v }),
            }
        };

        let config = Self {
            api_url: text(API_URL_ENV, defaults.api_url),
            geocoder_url: text(GEOCODER_URL_ENV, defaults.geocoder_url),
            user_agent: text(USER_AGENT_ENV, defaults.user_agent),
            country_code: text(COUNTRY_CODE_ENV, defaults.country_code),
            country_name: text(COUNTRY_NAME_ENV, defaults.country_name),
            region: defaults.region,
            poll_interval: Duration::from_secs(number(POLL_SECS_ENV, defaults.poll_interval.as_secs())?),
            request_timeout: Duration::from_secs(number(TIMEOUT_SECS_ENV, defaults.request_timeout.as_secs())?),
            storage_quota: number(STORAGE_QUOTA_ENV, defaults.storage_quota as u64)? as usize,
            db_path: text(DB_PATH_ENV, defaults.db_path),
        };
        debug!("[CONFIG] {:?}", config);
        Ok(config)
    }
}
