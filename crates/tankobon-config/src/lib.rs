#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Environment-driven configuration for Tankobon clients.
//!
//! Layout: `model.rs` (typed settings and defaults), `loader.rs` (environment
//! lookup and validation), `error.rs` (`ConfigError`).

pub mod error;
pub mod loader;
pub mod model;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    ENV_API_URL, ENV_COLD_START_MS, ENV_COLD_START_SETTLE_MS, ENV_DATA_DIR, ENV_HTTP_TIMEOUT_SECS,
    ENV_LOG_FORMAT, ENV_LOG_LEVEL, ENV_QUEUE_DELAY_MS, parse_api_url,
};
pub use model::{
    ClientConfig, DEFAULT_API_URL, DEFAULT_DATA_DIR, LogFormatSetting, LoggingSettings,
    TimingSettings,
};
