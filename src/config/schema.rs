//! Configuration schema definitions.
//!
//! This module defines the configuration of a `ConfigService`. All types
//! derive Serde traits for deserialization from TOML.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// File watching and hot reload.
    pub watch: WatchConfig,

    /// Source locator resolution.
    pub resolver: ResolverConfig,

    /// Instance production.
    pub module: ModuleConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Watch loop settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WatchConfig {
    /// Start the watch loop at all.
    pub enabled: bool,

    /// Sleep between checks while nothing is registered (milliseconds).
    pub idle_poll_ms: u64,

    /// Settle time before a batch of events is collapsed (milliseconds).
    pub debounce_ms: u64,

    /// Poll interval for platforms without native file events (milliseconds).
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            idle_poll_ms: 100,
            debounce_ms: 50,
            poll_interval_ms: 2000,
        }
    }
}

/// Locator resolution settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Directory relative locators resolve against. Defaults to the CWD.
    pub base_dir: Option<PathBuf>,

    /// Character wrapping an indirect locator (`@NAME@`).
    pub marker: char,

    /// Variables consulted before the process environment.
    pub variables: HashMap<String, String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            marker: crate::source::locator::DEFAULT_MARKER,
            variables: HashMap::new(),
        }
    }
}

/// How instances are produced.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FactoryKind {
    /// Emit a binary module and activate it.
    #[default]
    Bytecode,
    /// Build the dispatch table directly.
    Dispatch,
}

/// Instance production settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ModuleConfig {
    pub factory: FactoryKind,

    /// Write every emitted module here for offline inspection.
    pub dump_dir: Option<PathBuf>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive (trace, debug, info, warn, error, or `EnvFilter` syntax).
    pub log_level: String,

    /// Record counters and gauges.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}
