//! Metrics collection.
//!
//! # Metrics
//! - `capconf_builds_total` (counter): instance builds by contract, outcome
//! - `capconf_reuse_total` (counter): reload checks that kept the instance
//! - `capconf_reload_passes_total` (counter): reload passes run
//! - `capconf_reload_errors_total` (counter): per-contract reload failures
//! - `capconf_cached_contracts` (gauge): entries in the cache
//!
//! # Design Decisions
//! - Thin wrappers so call sites stay one line
//! - No recorder is installed here; without one every call is a no-op
//! - The on/off switch is per service, never process-wide

/// Outcome labels for `capconf_builds_total`.
pub mod outcome {
    pub const BUILT: &str = "built";
    pub const REPLACED: &str = "replaced";
    pub const DECLARATION_ERROR: &str = "declaration_error";
    pub const CONVERSION_ERROR: &str = "conversion_error";
    pub const MODULE_ERROR: &str = "module_error";
}

/// Per-service metrics switch, owned by each cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    enabled: bool,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Metrics {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record_build(&self, contract: &str, outcome: &'static str) {
        if !self.enabled {
            return;
        }
        ::metrics::counter!(
            "capconf_builds_total",
            "contract" => contract.to_string(),
            "outcome" => outcome
        )
        .increment(1);
    }

    pub fn record_reuse(&self, contract: &str) {
        if !self.enabled {
            return;
        }
        ::metrics::counter!("capconf_reuse_total", "contract" => contract.to_string()).increment(1);
    }

    pub fn record_reload_pass(&self) {
        if !self.enabled {
            return;
        }
        ::metrics::counter!("capconf_reload_passes_total").increment(1);
    }

    pub fn record_reload_error(&self, contract: &str) {
        if !self.enabled {
            return;
        }
        ::metrics::counter!("capconf_reload_errors_total", "contract" => contract.to_string()).increment(1);
    }

    pub fn record_cache_size(&self, size: usize) {
        if !self.enabled {
            return;
        }
        ::metrics::gauge!("capconf_cached_contracts").set(size as f64);
    }
}

/// A recorder that counts metric registrations, for asserting what was recorded.
#[cfg(test)]
pub(crate) mod testing {
    use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    pub struct CountingRecorder {
        registrations: AtomicUsize,
    }

    impl CountingRecorder {
        pub fn registrations(&self) -> usize {
            self.registrations.load(Ordering::SeqCst)
        }
    }

    impl Recorder for CountingRecorder {
        fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
        fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
        fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

        fn register_counter(&self, _key: &Key, _metadata: &Metadata<'_>) -> Counter {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            Counter::noop()
        }

        fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            Gauge::noop()
        }

        fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            Histogram::noop()
        }
    }
}
