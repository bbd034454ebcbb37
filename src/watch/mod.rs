//! File-change watching.
//!
//! # Data Flow
//! ```text
//! Resolver ──register(file)──► WatchRegistry ──subscribe(dir)──► notify watcher
//!                                                                     │ events
//!                                                                     ▼
//! ReloadCache::reload_all ◄──one pass per batch── WatchCoordinator (tokio task)
//! ```
//!
//! # Design Decisions
//! - One loop per service, spawned on the caller's Tokio runtime
//! - Directories are watched non-recursively; file names filter the events
//! - A batch of events collapses into a single reload pass
//! - Any matching event reloads every watchable contract; the fingerprint
//!   check keeps unaffected contracts on their current instance
//! - Reload passes run on the blocking pool since resolution does file I/O

pub mod coordinator;
pub mod registry;

use std::path::PathBuf;
use thiserror::Error;

pub use coordinator::{Reload, WatchCoordinator};
pub use registry::{DirectorySubscriber, WatchRegistry};

/// Errors from the watch subsystem.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("{} does not name a file", .0.display())]
    NotAFile(PathBuf),

    #[error("cannot watch directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to subscribe {}: {source}", path.display())]
    Subscribe {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("failed to create file watcher: {0}")]
    Init(#[source] notify::Error),

    #[error("file watching needs a Tokio runtime")]
    NoRuntime,
}
