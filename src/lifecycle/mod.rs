//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! ConfigService::start  → Shutdown::new → watch loop subscribes
//! ConfigService::shutdown (or drop)
//!     → Shutdown::trigger → watch loop exits
//!     → cache and registry cleared, OS watcher released
//! ```
//!
//! # Design Decisions
//! - Shutdown is best effort: in-flight builds run to completion
//! - Triggering twice is a no-op

pub mod shutdown;

pub use shutdown::Shutdown;
