//! Authenticated fetch: credentials, cold-start detection, and session expiry.
//!
//! # Design
//! - The token is read when the request is sent, never captured earlier.
//! - The network call races a cold-start timer; when the timer wins the flag is
//!   raised and the call keeps running.
//! - A 401 clears the session it was issued under; only the request that
//!   performs the clear alerts the user and requests a reload.
//! - Throttled sends run inside the queue, so queue wait never counts toward
//!   the cold-start threshold.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{Request, Response, StatusCode};
use tankobon_session::{BackendStatus, Notifier, SessionState, StartingSignal};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{ClientError, ClientResult, TransportError};
use crate::queue::RateLimitedQueue;
use crate::transport::{HEADER_REQUEST_ID, Transport};

/// Notice shown when the server rejects the session.
pub const SESSION_EXPIRED_NOTICE: &str = "Your session has expired. Please log in again.";

/// Timers governing cold-start detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchTimings {
    /// How long a request may take before the backend is assumed to be starting.
    pub cold_start_threshold: Duration,
    /// How long the flag stays up after a response finally arrives.
    pub cold_start_settle: Duration,
}

impl Default for FetchTimings {
    fn default() -> Self {
        Self {
            cold_start_threshold: Duration::from_millis(1_500),
            cold_start_settle: Duration::from_millis(3_000),
        }
    }
}

/// Decorator attaching the session token to requests sent over a [`Transport`].
#[derive(Clone)]
pub struct AuthFetch {
    session: SessionState,
    backend: BackendStatus,
    notifier: Arc<dyn Notifier>,
    transport: Arc<dyn Transport>,
    timings: FetchTimings,
}

impl AuthFetch {
    /// Build a fetcher with default timings.
    #[must_use]
    pub fn new(
        session: SessionState,
        backend: BackendStatus,
        notifier: Arc<dyn Notifier>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            session,
            backend,
            notifier,
            transport,
            timings: FetchTimings::default(),
        }
    }

    /// Override the cold-start timers.
    #[must_use]
    pub fn with_timings(mut self, timings: FetchTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Session consulted for credentials.
    #[must_use]
    pub const fn session(&self) -> &SessionState {
        &self.session
    }

    /// Backend-starting flag driven by this fetcher.
    #[must_use]
    pub const fn backend(&self) -> &BackendStatus {
        &self.backend
    }

    /// Send `request` with the current token attached.
    ///
    /// Returns `Ok(None)` when the server rejected the session (HTTP 401); the
    /// session has then been cleared and the UI notified.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Unauthenticated`] when no usable token is present. A
    ///   stored token that cannot be sent as a header is discarded.
    /// - [`ClientError::Transport`] when no response was obtained.
    pub async fn send(&self, mut request: Request) -> ClientResult<Option<Response>> {
        let snapshot = self.session.snapshot();
        let Some(token) = snapshot.token() else {
            return Err(ClientError::Unauthenticated);
        };
        let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {token}")) else {
            tracing::warn!("discarding session token that cannot be sent in a header");
            self.session.expire(snapshot.epoch);
            return Err(ClientError::Unauthenticated);
        };

        let request_id = Uuid::new_v4().to_string();
        let headers = request.headers_mut();
        headers.insert(AUTHORIZATION, bearer);
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            headers.insert(HEADER_REQUEST_ID, value);
        }

        let span = tracing::debug_span!(
            "auth_fetch",
            method = %request.method(),
            path = %request.url().path(),
            request_id = %request_id
        );
        self.dispatch(request, snapshot.epoch)
            .instrument(span)
            .await
    }

    /// Like [`send`](Self::send), but waits for a slot in `queue` first.
    ///
    /// The token is read and the cold-start timer started only once the queue
    /// dispatches the request.
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send), plus [`TransportError::QueueClosed`] when the
    /// queue consumer went away.
    pub async fn send_queued(
        &self,
        queue: &RateLimitedQueue,
        request: Request,
    ) -> ClientResult<Option<Response>> {
        let fetch = self.clone();
        queue.run(async move { fetch.send(request).await }).await?
    }

    async fn dispatch(&self, request: Request, epoch: u64) -> ClientResult<Option<Response>> {
        let (outcome, signal) = self.race_cold_start(request).await;
        let response = match outcome {
            Ok(response) => response,
            Err(source) => {
                self.backend.clear();
                tracing::warn!(error = %source, "request failed without a response");
                return Err(ClientError::Transport { source });
            }
        };

        if let Some(signal) = signal {
            self.backend
                .clear_after(signal, self.timings.cold_start_settle);
        }

        let status = response.status();
        tracing::debug!(status = status.as_u16(), "response received");
        if status == StatusCode::UNAUTHORIZED {
            self.expire_session(epoch);
            return Ok(None);
        }
        Ok(Some(response))
    }

    async fn race_cold_start(
        &self,
        request: Request,
    ) -> (Result<Response, TransportError>, Option<StartingSignal>) {
        let mut call = self.transport.execute(request);
        tokio::select! {
            biased;
            outcome = &mut call => (outcome, None),
            () = tokio::time::sleep(self.timings.cold_start_threshold) => {
                let pending = PendingStart {
                    backend: &self.backend,
                    signal: Some(self.backend.mark_starting()),
                };
                let outcome = call.await;
                (outcome, pending.disarm())
            }
        }
    }

    fn expire_session(&self, epoch: u64) {
        if self.session.expire(epoch) {
            tracing::warn!("server rejected the session token; signing out");
            self.notifier.alert(SESSION_EXPIRED_NOTICE);
            self.notifier.reload();
        } else {
            tracing::debug!("authorization failure for a session that already changed");
        }
    }
}

/// Raised cold-start flag owned by an in-flight call; lowered if the call is
/// dropped before a response arrives.
struct PendingStart<'a> {
    backend: &'a BackendStatus,
    signal: Option<StartingSignal>,
}

impl PendingStart<'_> {
    fn disarm(mut self) -> Option<StartingSignal> {
        self.signal.take()
    }
}

impl Drop for PendingStart<'_> {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.take() {
            tracing::debug!("request dropped while the backend flag was raised");
            self.backend.release(signal);
        }
    }
}
