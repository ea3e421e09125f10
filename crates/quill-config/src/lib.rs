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

//! Typed, cache-accelerated site configuration backed by `PostgreSQL`.
//!
//! Layout: `model.rs` (entries and change payloads), `codec.rs` (type-driven
//! encode/decode), `repository.rs` (`ConfigRepository` + Postgres
//! implementation), `service.rs` (`ConfigService` + `ConfigFacade`),
//! `site.rs` (public site/SEO/about projections), `defaults.rs`.

pub mod codec;
pub mod defaults;
pub mod error;
pub mod model;
pub mod repository;
pub mod service;
pub mod site;

#[cfg(test)]
mod fakes;

pub use codec::{decode_value, serialize_value};
pub use error::{ConfigError, ConfigResult};
pub use model::{
    BulkConfigItem, ConfigEntry, ConfigFilter, ConfigPatch, ConfigType, ConfigUpdate,
    DeleteConfirmation, NewConfig, StoredConfig,
};
pub use repository::{ConfigRepository, PgConfigRepository};
pub use service::{
    ALL_CONFIGS_CACHE_KEY, ConfigFacade, ConfigService, DEFAULT_CACHE_TTL,
    PUBLIC_CONFIGS_CACHE_KEY, ServiceOptions, entry_cache_key,
};
pub use site::{SeoSettings, SiteSettings, about_profile, seo_settings, site_settings};
