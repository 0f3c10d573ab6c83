//! Command handlers grouped by concern.

pub(crate) mod series;
pub(crate) mod session;
