//! Reload cache.
//!
//! # Data Flow
//! ```text
//! get(TypeId)
//!     hit  → Arc<LoadedModule> (lock-free read)
//!     miss → validate → resolve → factory.produce → insert-if-absent
//!
//! reload_all (from the watch loop)
//!     snapshot watchable entries
//!     → resolve each → same fingerprint: keep
//!                    → new fingerprint: produce, swap if entry unchanged
//! ```
//!
//! # Design Decisions
//! - No lock is held across resolution or production
//! - Racing first builds are accepted; the first install wins
//! - Failures are never cached and never evict a working instance

pub mod entry;
pub mod store;

pub use entry::CacheEntry;
pub use store::{ReloadCache, ReloadReport};
