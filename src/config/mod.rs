//! Service configuration.
//!
//! # Data Flow
//! ```text
//! capconf.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → ConfigService::start
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the service starts
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use validation::{validate_config, ValidationError};
pub use schema::{FactoryKind, ModuleConfig, ObservabilityConfig, ResolverConfig, ServiceConfig, WatchConfig};
