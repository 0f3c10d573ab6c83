//! Typed client settings.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Collection service used when nothing else is configured.
pub const DEFAULT_API_URL: &str = "https://manga-collection-backend-0fqi.onrender.com";
/// Directory holding the persisted session when nothing else is configured.
pub const DEFAULT_DATA_DIR: &str = "./.tankobon";

/// Everything a client process needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the collection service.
    pub api_url: Url,
    /// Directory for durable client state.
    pub data_dir: PathBuf,
    /// Upper bound on a single HTTP exchange.
    pub http_timeout: Duration,
    /// Cold-start and throttling timers.
    pub timings: TimingSettings,
    /// Log filter and output format.
    pub logging: LoggingSettings,
}

/// Timers for cold-start detection and the request queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingSettings {
    /// Wait before the backend is reported as starting.
    pub cold_start_threshold: Duration,
    /// How long the starting flag lingers after a late response.
    pub cold_start_settle: Duration,
    /// Gap between throttled requests.
    pub queue_delay: Duration,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            cold_start_threshold: Duration::from_millis(1_500),
            cold_start_settle: Duration::from_millis(3_000),
            queue_delay: Duration::from_millis(400),
        }
    }
}

/// Logging preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is absent.
    pub level: String,
    /// Explicit output format; `None` leaves the choice to the build profile.
    pub format: Option<LogFormatSetting>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: None,
        }
    }
}

/// Log output format requested through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormatSetting {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    Pretty,
}

impl LogFormatSetting {
    /// Parse a case-insensitive format name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" | "text" => Some(Self::Pretty),
            _ => None,
        }
    }
}

impl ClientConfig {
    /// Defaults rooted at `api_url`.
    #[must_use]
    pub fn with_api_url(api_url: Url) -> Self {
        Self {
            api_url,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            http_timeout: Duration::from_secs(30),
            timings: TimingSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}
