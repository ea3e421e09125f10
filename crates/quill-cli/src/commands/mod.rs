//! Command handlers grouped by concern.

pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod site;
