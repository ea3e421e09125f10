#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Shared data access layer for Quill: migrations, stored procedures, and row projections
//! for the site configuration store.

pub mod config;
pub mod error;

pub use config::{ConfigRow, ConfigRowPatch, NewConfigRow};
pub use error::{DataError, Result as DataResult};
