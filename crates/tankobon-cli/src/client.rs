//! Shared context, error types, and UI signal wiring for the CLI.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use anyhow::anyhow;
use reqwest::{Client, StatusCode};
use tankobon_client::{
    AuthFetch, ClientError, CollectionClient, FetchTimings, RateLimitedQueue, Transport,
};
use tankobon_config::ClientConfig;
use tankobon_session::{BackendStatus, FileStore, Notifier, SessionState};
use tokio::task::JoinHandle;

/// Printed once when a request outlives the cold-start threshold.
pub(crate) const BACKEND_WAKING_NOTICE: &str =
    "The collection service is waking up; this can take up to a minute...";

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<ClientError> for CliError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unauthenticated => {
                Self::validation("not signed in; run `tankobon login --token <TOKEN>` first")
            }
            ClientError::SessionExpired => Self::failure(anyhow!(
                "session expired; run `tankobon login --token <TOKEN>` to sign in again"
            )),
            ClientError::Api { status, .. } => {
                let message = err
                    .server_message()
                    .unwrap_or_else(|| format!("request failed with status {status}"));
                if matches!(
                    status,
                    StatusCode::BAD_REQUEST
                        | StatusCode::CONFLICT
                        | StatusCode::UNPROCESSABLE_ENTITY
                ) {
                    Self::validation(message)
                } else {
                    Self::failure(anyhow!("{message} (status {status})"))
                }
            }
            other => Self::failure(other),
        }
    }
}

/// Notifier printing user-facing notices to stderr.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn alert(&self, message: &str) {
        eprintln!("{message}");
    }

    fn reload(&self) {
        tracing::info!("stored session discarded");
    }
}

/// Handles constructed once per invocation and passed to command handlers.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) store: Arc<FileStore>,
    pub(crate) session: SessionState,
    pub(crate) backend: BackendStatus,
    pub(crate) collection: CollectionClient,
}

impl AppContext {
    /// Wire session, fetch decorators, queue, and collection client from `config`.
    pub(crate) fn build(config: &ClientConfig, notifier: Arc<dyn Notifier>) -> CliResult<Self> {
        let http = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;
        let transport: Arc<dyn Transport> = Arc::new(http);

        let store = Arc::new(FileStore::new(&config.data_dir));
        let session = SessionState::load(store.clone());
        let backend = BackendStatus::new();
        let fetch = AuthFetch::new(
            session.clone(),
            backend.clone(),
            notifier,
            Arc::clone(&transport),
        )
        .with_timings(FetchTimings {
            cold_start_threshold: config.timings.cold_start_threshold,
            cold_start_settle: config.timings.cold_start_settle,
        });
        let queue = RateLimitedQueue::new(transport, config.timings.queue_delay);
        let collection = CollectionClient::new(fetch, queue, config.api_url.clone())
            .map_err(CliError::from)?;

        Ok(Self {
            store,
            session,
            backend,
            collection,
        })
    }

    /// Fail early when no token is stored.
    pub(crate) fn require_session(&self) -> CliResult<()> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            Err(ClientError::Unauthenticated.into())
        }
    }
}

/// Print a notice each time the backend-starting flag rises.
pub(crate) fn spawn_backend_notice(backend: &BackendStatus) -> JoinHandle<()> {
    let mut starting = backend.subscribe();
    tokio::spawn(async move {
        while starting.changed().await.is_ok() {
            if *starting.borrow_and_update() {
                eprintln!("{BACKEND_WAKING_NOTICE}");
            }
        }
    })
}
