//! The plain network call that the fetch decorators wrap.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Request, Response};

use crate::error::TransportError;

/// Header carrying a per-request correlation identifier.
pub const HEADER_REQUEST_ID: &str = "x-request-id";

/// Executes a fully built request and yields whatever response arrives.
///
/// Non-success statuses are responses, not errors; only the absence of a
/// response is a [`TransportError`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute `request`.
    ///
    /// # Errors
    ///
    /// Returns an error when no response could be obtained.
    async fn execute(&self, request: Request) -> Result<Response, TransportError>;
}

#[async_trait]
impl Transport for Client {
    async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        Client::execute(self, request)
            .await
            .map_err(|source| TransportError::Network { source })
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        (**self).execute(request).await
    }
}
