//! Configuration sources.
//!
//! # Data Flow
//! ```text
//! source locator ("app.properties" or "@VAR@")
//!     → locator.rs (indirection, base dir)
//!     → SourceReader (properties.rs by default)
//!     → flat key → text mapping
//! ```
//!
//! # Design Decisions
//! - The file format is a black box behind `SourceReader`
//! - Missing files and unresolved variables are not errors here; the
//!   resolver turns them into warnings

pub mod locator;
pub mod properties;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use locator::{Located, LocatorResolver};
pub use properties::PropertiesReader;

/// Reads a configuration source into a flat mapping.
pub trait SourceReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<HashMap<String, String>, SourceError>;
}

/// Errors reading a configuration source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
