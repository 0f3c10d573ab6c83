//! Named collection operations over the authenticated fetch, with a shared cache.
//!
//! # Design
//! - Every operation goes through [`AuthFetch`]; metadata batches wait for a
//!   slot in a [`RateLimitedQueue`] before the authenticated send starts.
//! - Successful writes reconcile the cache either by replacing the single
//!   returned entity or by refetching the whole collection.
//! - Failed requests never touch the cache. Reads log and yield an empty
//!   result; writes return the failure. Transport failures always propagate.

use std::sync::Arc;

use futures_util::future::try_join_all;
use reqwest::{Body, Method, Request, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::fetch::AuthFetch;
use crate::models::{EntityId, NewSeries, Series, SeriesMetadata, SeriesPatch};
use crate::queue::RateLimitedQueue;

const LIST_OPERATION: &str = "list_series";
const METADATA_OPERATION: &str = "fetch_metadata";

#[derive(Clone, Copy, Debug)]
enum Route {
    Direct,
    Throttled,
}

/// Client for the collection service.
#[derive(Clone)]
pub struct CollectionClient {
    fetch: AuthFetch,
    queue: RateLimitedQueue,
    base_url: Url,
    cache: Arc<watch::Sender<Vec<Series>>>,
}

impl CollectionClient {
    /// Build a client rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidBaseUrl`] when `base_url` cannot carry
    /// path segments (e.g. `mailto:` or `data:` URLs).
    pub fn new(fetch: AuthFetch, queue: RateLimitedQueue, base_url: Url) -> ClientResult<Self> {
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl {
                url: base_url.to_string(),
            });
        }
        let (cache, _) = watch::channel(Vec::new());
        Ok(Self {
            fetch,
            queue,
            base_url,
            cache: Arc::new(cache),
        })
    }

    /// Current cached collection.
    #[must_use]
    pub fn series(&self) -> Vec<Series> {
        self.cache.borrow().clone()
    }

    /// Observe cache changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<Series>> {
        self.cache.subscribe()
    }

    /// Drop every cached entry.
    pub fn reset(&self) {
        self.cache.send_if_modified(|series| {
            let changed = !series.is_empty();
            series.clear();
            changed
        });
    }

    /// Reload the whole collection and replace the cache.
    ///
    /// Application failures are logged and yield an empty list with the cache
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when no response was obtained.
    pub async fn refresh(&self) -> ClientResult<Vec<Series>> {
        let Some(series) = soften(LIST_OPERATION, self.list().await)? else {
            return Ok(Vec::new());
        };
        tracing::debug!(count = series.len(), "collection refreshed");
        self.cache.send_replace(series.clone());
        Ok(series)
    }

    /// Create a series, then refetch the collection.
    ///
    /// # Errors
    ///
    /// Returns the failure of the create call. A failed refetch afterwards
    /// only propagates transport errors.
    pub async fn add_series(&self, series: &NewSeries) -> ClientResult<()> {
        const OPERATION: &str = "add_series";
        let request = self.request_with_body(Method::POST, &["series"], OPERATION, series)?;
        self.execute(Route::Direct, OPERATION, request).await?;
        self.refresh().await.map(drop)
    }

    /// Flip the completion flag of series `id` and replace its cached entry.
    ///
    /// # Errors
    ///
    /// Returns any transport, API, or decode failure.
    pub async fn toggle_complete(&self, id: EntityId) -> ClientResult<Series> {
        const OPERATION: &str = "toggle_complete";
        let id = id.to_string();
        let request =
            self.request(Method::PATCH, &["series", id.as_str(), "toggle_complete"])?;
        let response = self.execute(Route::Direct, OPERATION, request).await?;
        let updated = decode::<Series>(OPERATION, response).await?;
        self.replace_entry(&updated);
        Ok(updated)
    }

    /// Flip ownership of volume `volume_id`, then refetch the collection.
    ///
    /// # Errors
    ///
    /// Returns the failure of the toggle call. A failed refetch afterwards
    /// only propagates transport errors.
    pub async fn toggle_owned(&self, volume_id: EntityId) -> ClientResult<()> {
        const OPERATION: &str = "toggle_owned";
        let volume_id = volume_id.to_string();
        let request = self.request(Method::POST, &["volumes", volume_id.as_str(), "toggle"])?;
        self.execute(Route::Direct, OPERATION, request).await?;
        self.refresh().await.map(drop)
    }

    /// Apply a partial update to series `id` and replace its cached entry.
    ///
    /// # Errors
    ///
    /// Returns any encode, transport, API, or decode failure.
    pub async fn update_series(&self, id: EntityId, patch: &SeriesPatch) -> ClientResult<Series> {
        const OPERATION: &str = "update_series";
        let id = id.to_string();
        let request =
            self.request_with_body(Method::PATCH, &["series", id.as_str()], OPERATION, patch)?;
        let response = self.execute(Route::Direct, OPERATION, request).await?;
        let updated = decode::<Series>(OPERATION, response).await?;
        self.replace_entry(&updated);
        Ok(updated)
    }

    /// Delete series `id` and drop it from the cache.
    ///
    /// # Errors
    ///
    /// Returns any transport or API failure; deleting an unknown id surfaces
    /// the server's not-found response.
    pub async fn delete_series(&self, id: EntityId) -> ClientResult<()> {
        const OPERATION: &str = "delete_series";
        let segment = id.to_string();
        let request = self.request(Method::DELETE, &["series", segment.as_str()])?;
        self.execute(Route::Direct, OPERATION, request).await?;
        self.cache.send_if_modified(|series| {
            let before = series.len();
            series.retain(|entry| entry.id != id);
            series.len() != before
        });
        Ok(())
    }

    /// Look up external metadata for `external_id`.
    ///
    /// A not-found response, a null body, or any application failure yields
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when no response was obtained.
    pub async fn fetch_metadata(&self, external_id: &str) -> ClientResult<Option<SeriesMetadata>> {
        self.metadata_via(Route::Direct, external_id).await
    }

    /// Look up metadata for several ids through the rate-limited queue.
    ///
    /// Results are returned in the order of `external_ids`.
    ///
    /// # Errors
    ///
    /// Returns the first transport failure.
    pub async fn fetch_metadata_many<S: AsRef<str>>(
        &self,
        external_ids: &[S],
    ) -> ClientResult<Vec<Option<SeriesMetadata>>> {
        try_join_all(
            external_ids
                .iter()
                .map(|id| self.metadata_via(Route::Throttled, id.as_ref())),
        )
        .await
    }

    async fn metadata_via(
        &self,
        route: Route,
        external_id: &str,
    ) -> ClientResult<Option<SeriesMetadata>> {
        match self.lookup_metadata(route, external_id).await {
            Err(ClientError::Api { status, .. }) if status == StatusCode::NOT_FOUND => {
                tracing::debug!(external_id, "no metadata available");
                Ok(None)
            }
            other => Ok(soften(METADATA_OPERATION, other)?.flatten()),
        }
    }

    async fn list(&self) -> ClientResult<Vec<Series>> {
        let request = self.request(Method::GET, &["series"])?;
        let response = self.execute(Route::Direct, LIST_OPERATION, request).await?;
        decode(LIST_OPERATION, response).await
    }

    async fn lookup_metadata(
        &self,
        route: Route,
        external_id: &str,
    ) -> ClientResult<Option<SeriesMetadata>> {
        let request = self.request(Method::GET, &["metadata", external_id])?;
        let response = self.execute(route, METADATA_OPERATION, request).await?;
        decode(METADATA_OPERATION, response).await
    }

    async fn execute(
        &self,
        route: Route,
        operation: &'static str,
        request: Request,
    ) -> ClientResult<Response> {
        let sent = match route {
            Route::Direct => self.fetch.send(request).await,
            Route::Throttled => self.fetch.send_queued(&self.queue, request).await,
        };
        let Some(response) = sent? else {
            self.reset();
            return Err(ClientError::SessionExpired);
        };
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            operation,
            status = status.as_u16(),
            body = %body,
            "collection request failed"
        );
        Err(ClientError::Api {
            operation,
            status,
            body,
        })
    }

    fn replace_entry(&self, updated: &Series) {
        self.cache.send_if_modified(|series| {
            let mut changed = false;
            for entry in series.iter_mut().filter(|entry| entry.id == updated.id) {
                entry.clone_from(updated);
                changed = true;
            }
            changed
        });
    }

    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidBaseUrl {
                url: self.base_url.to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> ClientResult<Request> {
        Ok(Request::new(method, self.endpoint(segments)?))
    }

    fn request_with_body<T: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        operation: &'static str,
        body: &T,
    ) -> ClientResult<Request> {
        let payload = serde_json::to_vec(body)
            .map_err(|source| ClientError::Encode { operation, source })?;
        let mut request = self.request(method, segments)?;
        *request.body_mut() = Some(Body::from(payload));
        Ok(request)
    }
}

async fn decode<T: DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> ClientResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|source| ClientError::Decode { operation, source })
}

/// Read-path policy: only transport failures escape.
fn soften<T>(operation: &'static str, outcome: ClientResult<T>) -> ClientResult<Option<T>> {
    match outcome {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_transport() => Err(err),
        Err(err) => {
            tracing::warn!(operation, error = %err, "read yielded no data");
            Ok(None)
        }
    }
}
