//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! resolver, cache, watch loop produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (build/reuse/reload counters, cache size gauge)
//! ```
//!
//! # Design Decisions
//! - Resolution warnings are logged and also kept on the binding so callers
//!   can inspect them
//! - Metrics are cheap (atomic increments) and free without a recorder

pub mod logging;
pub mod metrics;
