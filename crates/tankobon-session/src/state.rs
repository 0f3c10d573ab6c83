//! Session state: the bearer token, its persistence, and the derived identity.
//!
//! # Design
//! - The token is the single source of truth; identity is recomputed from it.
//! - Every mutation bumps an epoch so late authorization failures can only clear
//!   the session they were issued under.
//! - Persistence failures are logged and never block the in-memory transition.

use std::sync::Arc;

use tokio::sync::watch;

use crate::identity::{SessionIdentity, TokenClaims};
use crate::store::KeyValueStore;

/// Storage key under which the token is persisted.
pub const TOKEN_KEY: &str = "token";

/// Token value together with the epoch it was set in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenSnapshot {
    /// Raw token; empty when signed out.
    pub token: String,
    /// Mutation counter at the time of the snapshot.
    pub epoch: u64,
}

impl TokenSnapshot {
    /// Token value, or `None` when signed out.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        (!self.token.is_empty()).then_some(self.token.as_str())
    }
}

/// Shared handle to the current session.
#[derive(Clone)]
pub struct SessionState {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    store: Arc<dyn KeyValueStore>,
    slot: watch::Sender<TokenSnapshot>,
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SessionState")
            .field("authenticated", &self.is_authenticated())
            .field("epoch", &self.snapshot().epoch)
            .finish_non_exhaustive()
    }
}

impl SessionState {
    /// Load the session from durable storage, starting signed out when no
    /// token was persisted or the store cannot be read.
    #[must_use]
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let token = match store.get(TOKEN_KEY) {
            Ok(value) => value.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read persisted token");
                String::new()
            }
        };
        let (slot, _) = watch::channel(TokenSnapshot { token, epoch: 0 });
        Self {
            inner: Arc::new(SessionInner { store, slot }),
        }
    }

    /// Replace the token; an empty value signs the session out.
    pub fn set_token(&self, value: impl Into<String>) {
        let value = value.into();
        self.inner.slot.send_modify(|slot| {
            slot.token.clone_from(&value);
            slot.epoch += 1;
        });
        self.persist(&value);
    }

    /// Sign out.
    pub fn clear(&self) {
        self.set_token(String::new());
    }

    /// Clear the session only if it has not changed since `epoch`.
    ///
    /// Returns `true` when this call performed the clear, so concurrent
    /// authorization failures agree on a single winner.
    pub fn expire(&self, epoch: u64) -> bool {
        let expired = self.inner.slot.send_if_modified(|slot| {
            if slot.epoch != epoch || slot.token.is_empty() {
                return false;
            }
            slot.token.clear();
            slot.epoch += 1;
            true
        });
        if expired {
            tracing::info!(epoch, "session expired");
            self.persist("");
        }
        expired
    }

    /// Current token and epoch, captured together.
    #[must_use]
    pub fn snapshot(&self) -> TokenSnapshot {
        self.inner.slot.borrow().clone()
    }

    /// Current token, or `None` when signed out.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.snapshot().token().map(str::to_string)
    }

    /// Whether a token is present (it may still be rejected by the server).
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.inner.slot.borrow().token.is_empty()
    }

    /// Identity derived from the current token.
    #[must_use]
    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity::from_token(&self.inner.slot.borrow().token)
    }

    /// Decoded claims of the current token, if it is readable.
    #[must_use]
    pub fn claims(&self) -> Option<TokenClaims> {
        TokenClaims::decode(&self.inner.slot.borrow().token)
    }

    /// Watch identity changes.
    #[must_use]
    pub fn subscribe(&self) -> IdentityWatch {
        IdentityWatch {
            receiver: self.inner.slot.subscribe(),
        }
    }

    fn persist(&self, value: &str) {
        let result = if value.is_empty() {
            self.inner.store.remove(TOKEN_KEY)
        } else {
            self.inner.store.set(TOKEN_KEY, value)
        };
        if let Err(err) = result {
            tracing::warn!(error = %err, key = TOKEN_KEY, "failed to persist token");
        }
    }
}

/// Receiver yielding the recomputed identity after every token change.
#[derive(Debug)]
pub struct IdentityWatch {
    receiver: watch::Receiver<TokenSnapshot>,
}

impl IdentityWatch {
    /// Identity for the latest token, marking it as seen.
    #[must_use]
    pub fn current(&mut self) -> SessionIdentity {
        SessionIdentity::from_token(&self.receiver.borrow_and_update().token)
    }

    /// Wait for the next token change and return the recomputed identity.
    ///
    /// Returns `None` once the session has been dropped.
    pub async fn changed(&mut self) -> Option<SessionIdentity> {
        self.receiver.changed().await.ok()?;
        Some(self.current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::tests::token_with;
    use crate::store::{MemoryStore, StoreError, StoreResult};
    use serde_json::json;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> StoreResult<Option<String>> {
            Err(broken())
        }
        fn set(&self, _key: &str, _value: &str) -> StoreResult<()> {
            Err(broken())
        }
        fn remove(&self, _key: &str) -> StoreResult<()> {
            Err(broken())
        }
    }

    fn broken() -> StoreError {
        StoreError::Io {
            operation: "test",
            path: "/dev/null".into(),
            source: std::io::Error::other("broken"),
        }
    }

    #[test]
    fn load_reads_persisted_token_once() {
        let token = token_with(&json!({"sub": "alice"}));
        let store = Arc::new(MemoryStore::with_entry(TOKEN_KEY, &token));
        let session = SessionState::load(store);
        assert_eq!(session.token().as_deref(), Some(token.as_str()));
        assert_eq!(session.identity().username.as_deref(), Some("alice"));
    }

    #[test]
    fn empty_store_starts_signed_out() {
        let session = SessionState::load(Arc::new(MemoryStore::new()));
        assert!(!session.is_authenticated());
        assert_eq!(session.identity(), SessionIdentity::neutral());
    }

    #[test]
    fn set_token_persists_and_clear_removes() {
        let store = Arc::new(MemoryStore::new());
        let session = SessionState::load(store.clone());
        session.set_token("abc.def.ghi");
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("abc.def.ghi"));
        session.clear();
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(session.token(), None);
    }

    #[test]
    fn storage_failures_do_not_block_transitions() {
        let session = SessionState::load(Arc::new(BrokenStore));
        assert!(!session.is_authenticated());
        session.set_token("abc.def.ghi");
        assert!(session.is_authenticated());
        session.clear();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn expire_only_clears_matching_epoch() {
        let session = SessionState::load(Arc::new(MemoryStore::new()));
        session.set_token("first.token.sig");
        let stale = session.snapshot();
        session.set_token("second.token.sig");

        assert!(!session.expire(stale.epoch));
        assert_eq!(session.token().as_deref(), Some("second.token.sig"));

        let current = session.snapshot();
        assert!(session.expire(current.epoch));
        assert!(!session.expire(current.epoch));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn identity_watch_recomputes_on_change() {
        let session = SessionState::load(Arc::new(MemoryStore::new()));
        let mut watch = session.subscribe();
        assert_eq!(watch.current(), SessionIdentity::neutral());

        session.set_token(token_with(&json!({"sub": "alice", "is_admin": true})));
        let identity = watch.changed().await.expect("identity");
        assert_eq!(identity.username.as_deref(), Some("alice"));
        assert!(identity.is_admin);

        session.set_token("garbage");
        assert_eq!(watch.changed().await, Some(SessionIdentity::neutral()));
    }
}
