//! Load [`ClientConfig`] from environment variables.
//!
//! Unset or blank variables fall back to defaults; set-but-invalid values are
//! rejected rather than silently ignored.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    ClientConfig, DEFAULT_API_URL, DEFAULT_DATA_DIR, LogFormatSetting, LoggingSettings,
    TimingSettings,
};

/// Base URL of the collection service.
pub const ENV_API_URL: &str = "TANKOBON_API_URL";
/// Directory for durable client state.
pub const ENV_DATA_DIR: &str = "TANKOBON_DATA_DIR";
/// HTTP timeout in whole seconds.
pub const ENV_HTTP_TIMEOUT_SECS: &str = "TANKOBON_HTTP_TIMEOUT_SECS";
/// Cold-start threshold in milliseconds.
pub const ENV_COLD_START_MS: &str = "TANKOBON_COLD_START_MS";
/// Cold-start settle window in milliseconds.
pub const ENV_COLD_START_SETTLE_MS: &str = "TANKOBON_COLD_START_SETTLE_MS";
/// Gap between throttled requests in milliseconds.
pub const ENV_QUEUE_DELAY_MS: &str = "TANKOBON_QUEUE_DELAY_MS";
/// Default log filter.
pub const ENV_LOG_LEVEL: &str = "TANKOBON_LOG_LEVEL";
/// Log output format (`json` or `pretty`).
pub const ENV_LOG_FORMAT: &str = "TANKOBON_LOG_FORMAT";

impl ClientConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for any variable holding an
    /// unusable value.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for any variable holding an
    /// unusable value.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_url = parse_api_url(
            ENV_API_URL,
            read(ENV_API_URL).as_deref().unwrap_or(DEFAULT_API_URL),
        )?;
        let data_dir =
            PathBuf::from(read(ENV_DATA_DIR).unwrap_or_else(|| DEFAULT_DATA_DIR.into()));

        let http_timeout = match read(ENV_HTTP_TIMEOUT_SECS) {
            Some(value) => Duration::from_secs(parse_positive(ENV_HTTP_TIMEOUT_SECS, &value)?),
            None => Duration::from_secs(30),
        };

        let defaults = TimingSettings::default();
        let timings = TimingSettings {
            cold_start_threshold: millis_or(
                ENV_COLD_START_MS,
                read(ENV_COLD_START_MS),
                defaults.cold_start_threshold,
            )?,
            cold_start_settle: millis_or(
                ENV_COLD_START_SETTLE_MS,
                read(ENV_COLD_START_SETTLE_MS),
                defaults.cold_start_settle,
            )?,
            queue_delay: millis_or(
                ENV_QUEUE_DELAY_MS,
                read(ENV_QUEUE_DELAY_MS),
                defaults.queue_delay,
            )?,
        };

        let format = read(ENV_LOG_FORMAT)
            .map(|value| {
                LogFormatSetting::parse(&value).ok_or_else(|| {
                    ConfigError::invalid(ENV_LOG_FORMAT, &value, "expected 'json' or 'pretty'")
                })
            })
            .transpose()?;
        let logging = LoggingSettings {
            level: read(ENV_LOG_LEVEL).unwrap_or_else(|| LoggingSettings::default().level),
            format,
        };

        Ok(Self {
            api_url,
            data_dir,
            http_timeout,
            timings,
            logging,
        })
    }
}

/// Parse a collection service URL; it must be absolute `http` or `https`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] tagged with `field` when `value` is
/// not a usable base URL.
pub fn parse_api_url(field: &'static str, value: &str) -> ConfigResult<Url> {
    let url = Url::parse(value.trim())
        .map_err(|_| ConfigError::invalid(field, value, "must be an absolute URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(field, value, "scheme must be http or https"));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(ConfigError::invalid(field, value, "must include a host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::invalid(
            field,
            value,
            "must not carry a query or fragment",
        ));
    }
    Ok(url)
}

fn parse_positive(field: &'static str, value: &str) -> ConfigResult<u64> {
    match value.parse::<u64>() {
        Ok(0) => Err(ConfigError::invalid(field, value, "must be greater than zero")),
        Ok(parsed) => Ok(parsed),
        Err(_) => Err(ConfigError::invalid(field, value, "must be a whole number")),
    }
}

fn millis_or(
    field: &'static str,
    value: Option<String>,
    default: Duration,
) -> ConfigResult<Duration> {
    value.map_or(Ok(default), |value| {
        value
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| {
                ConfigError::invalid(field, &value, "must be a whole number of milliseconds")
            })
    })
}
