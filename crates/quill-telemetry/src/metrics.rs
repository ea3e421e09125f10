//! Prometheus-backed metrics for the configuration cache.
//!
//! An embedding host scrapes [`Metrics::render`]; the `quill` CLI prints the
//! same text to stderr when run with `--metrics`.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Each `Metrics` owns its own registry, so independent instances never clash.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Which cache entry family a lookup touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    /// A single `config:<key>` entry.
    Entry,
    /// One of the `config:all` aggregates.
    List,
}

impl CacheScope {
    /// Label value used in exported metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::List => "list",
        }
    }
}

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    cache_hits_total: IntCounterVec,
    cache_misses_total: IntCounterVec,
    config_writes_total: IntCounterVec,
    config_write_failures_total: IntCounterVec,
    cache_invalidation_failures_total: IntCounter,
}

/// Point-in-time view of the configuration counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Cache hits on single-key entries.
    pub entry_cache_hits: u64,
    /// Cache misses on single-key entries.
    pub entry_cache_misses: u64,
    /// Cache hits on list aggregates.
    pub list_cache_hits: u64,
    /// Cache misses on list aggregates.
    pub list_cache_misses: u64,
    /// Successful configuration writes across all operations.
    pub config_writes: u64,
    /// Swallowed cache invalidation failures.
    pub cache_invalidation_failures: u64,
}

const WRITE_OPERATIONS: [&str; 3] = ["update", "bulk_update", "delete"];

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let cache_hits_total = counter_vec(
            "config_cache_hits_total",
            "Configuration cache hits by scope",
            &["scope"],
        )?;
        let cache_misses_total = counter_vec(
            "config_cache_misses_total",
            "Configuration cache misses by scope",
            &["scope"],
        )?;
        let config_writes_total = counter_vec(
            "config_writes_total",
            "Committed configuration writes by operation",
            &["operation"],
        )?;
        let config_write_failures_total = counter_vec(
            "config_write_failures_total",
            "Rejected or failed configuration writes by operation",
            &["operation"],
        )?;
        let cache_invalidation_failures_total = IntCounter::with_opts(Opts::new(
            "config_cache_invalidation_failures_total",
            "Cache deletes that failed and were swallowed",
        ))
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "config_cache_invalidation_failures_total",
            source,
        })?;

        register(&registry, "config_cache_hits_total", &cache_hits_total)?;
        register(&registry, "config_cache_misses_total", &cache_misses_total)?;
        register(&registry, "config_writes_total", &config_writes_total)?;
        register(
            &registry,
            "config_write_failures_total",
            &config_write_failures_total,
        )?;
        register(
            &registry,
            "config_cache_invalidation_failures_total",
            &cache_invalidation_failures_total,
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                cache_hits_total,
                cache_misses_total,
                config_writes_total,
                config_write_failures_total,
                cache_invalidation_failures_total,
            }),
        })
    }

    /// Count a cache hit.
    pub fn inc_cache_hit(&self, scope: CacheScope) {
        self.inner
            .cache_hits_total
            .with_label_values(&[scope.as_str()])
            .inc();
    }

    /// Count a cache miss.
    pub fn inc_cache_miss(&self, scope: CacheScope) {
        self.inner
            .cache_misses_total
            .with_label_values(&[scope.as_str()])
            .inc();
    }

    /// Count a committed write (`update`, `bulk_update`, `delete`).
    pub fn inc_config_write(&self, operation: &str) {
        self.inner
            .config_writes_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Count a write that returned an error.
    pub fn inc_config_write_failure(&self, operation: &str) {
        self.inner
            .config_write_failures_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Count a cache delete that failed during invalidation.
    pub fn inc_cache_invalidation_failure(&self) {
        self.inner.cache_invalidation_failures_total.inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the configuration counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = &self.inner;
        let scoped = |vec: &IntCounterVec, scope: CacheScope| {
            vec.with_label_values(&[scope.as_str()]).get()
        };
        MetricsSnapshot {
            entry_cache_hits: scoped(&inner.cache_hits_total, CacheScope::Entry),
            entry_cache_misses: scoped(&inner.cache_misses_total, CacheScope::Entry),
            list_cache_hits: scoped(&inner.cache_hits_total, CacheScope::List),
            list_cache_misses: scoped(&inner.cache_misses_total, CacheScope::List),
            config_writes: WRITE_OPERATIONS
                .iter()
                .map(|operation| inner.config_writes_total.with_label_values(&[*operation]).get())
                .sum(),
            cache_invalidation_failures: inner.cache_invalidation_failures_total.get(),
        }
    }
}
