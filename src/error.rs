//! Crate-level error type.

use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::contract::DeclarationError;
use crate::module::ModuleError;
use crate::resolver::ResolveError;
use crate::watch::WatchError;

/// Everything a `ConfigService` caller can see go wrong.
#[derive(Debug, Error)]
pub enum Error {
    /// The contract type itself is malformed. Retrying will fail again.
    #[error("invalid contract: {0}")]
    Declaration(#[from] DeclarationError),

    /// A configured value does not convert to its declared kind.
    #[error("resolution failed: {0}")]
    Resolve(ResolveError),

    #[error("instance production failed: {0}")]
    Module(#[from] ModuleError),

    #[error("watch setup failed: {0}")]
    Watch(#[from] WatchError),

    #[error("service configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("configuration service has been shut down")]
    ShutDown,
}

impl From<ResolveError> for Error {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::Declaration(d) => Error::Declaration(d),
            other => Error::Resolve(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
