//! Configuration-backed capabilities with hot reload.
//!
//! A contract declares zero-argument typed accessors, each bound to a key in
//! a `key=value` source file and a default. `ConfigService::get` turns the
//! contract into a live instance whose accessors return precomputed
//! constants, and swaps in a new instance when the file's relevant values
//! change.
//!
//! # Architecture Overview
//!
//! ```text
//!   contract!  ──►  ContractDecl ──validate──► ContractDescriptor
//!                                                   │
//!   ConfigService::get::<C>()                       ▼
//!     └─► ReloadCache ──miss──► ContractResolver ──► ResolvedBinding
//!           ▲   │                 │ (locator, properties, codec)
//!           │   │                 └─► WatchRegistry ──► notify
//!           │   ▼                                         │
//!           │  InstanceFactory ──► ModuleBuilder ──► activate ──► LoadedModule
//!           │                                                      │
//!           │                                         Capability<C> (typed handle)
//!           │
//!           └── reload_all ◄── WatchCoordinator (tokio task) ◄── file events
//! ```

// Core subsystems
pub mod cache;
pub mod codec;
pub mod contract;
pub mod module;
pub mod resolver;
pub mod source;
pub mod watch;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod service;

pub use codec::{ConversionError, FromScalar, ScalarKind, ScalarValue};
pub use config::ServiceConfig;
pub use contract::{AccessorDecl, AccessorSpec, Contract, ContractDecl, ContractDescriptor, DeclarationError};
pub use error::{Error, Result};
pub use lifecycle::Shutdown;
pub use module::{Capability, InstanceId, LoadedModule};
pub use resolver::{ResolutionWarning, ResolveError};
pub use service::ConfigService;
