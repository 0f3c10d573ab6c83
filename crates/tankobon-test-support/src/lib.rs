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

//! Shared test helpers used across the Tankobon crates.
//! Layout: tokens.rs (unsigned JWT-shaped tokens), notifier.rs (recording UI seam), fixtures.rs (collection payloads).

pub mod fixtures;
pub mod notifier;
pub mod tokens;
