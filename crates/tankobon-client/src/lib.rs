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
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

//! HTTP access to the Tankobon collection service.
//!
//! Two orthogonal decorators wrap a plain [`Transport`]: [`AuthFetch`]
//! attaches credentials and watches for cold starts and session expiry, and
//! [`RateLimitedQueue`] serialises calls with a fixed gap. [`CollectionClient`]
//! composes them with a shared collection cache.

pub mod collection;
pub mod error;
pub mod fetch;
pub mod models;
pub mod queue;
pub mod transport;

pub use collection::CollectionClient;
pub use error::{ClientError, ClientResult, TransportError};
pub use fetch::{AuthFetch, FetchTimings, SESSION_EXPIRED_NOTICE};
pub use models::{EntityId, NewSeries, Series, SeriesMetadata, SeriesPatch, Volume};
pub use queue::{DEFAULT_QUEUE_DELAY, RateLimitedQueue};
pub use transport::{HEADER_REQUEST_ID, Transport};
