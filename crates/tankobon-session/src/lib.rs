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

//! Session state for the Tankobon client.
//!
//! Layout: `identity.rs` (token claims and derived identity), `store.rs`
//! (durable key-value storage), `state.rs` (`SessionState` handle),
//! `signals.rs` (backend-starting flag and UI notifier seam).

pub mod identity;
pub mod signals;
pub mod state;
pub mod store;

pub use identity::{SessionIdentity, TokenClaims};
pub use signals::{BackendStatus, LogNotifier, Notifier, StartingSignal};
pub use state::{IdentityWatch, SessionState, TOKEN_KEY, TokenSnapshot};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError, StoreResult};
