//! Contract declaration surface.
//!
//! # Data Flow
//! ```text
//! contract! { ... }  (or a hand-written Contract impl)
//!     → ContractDecl (raw metadata: names, keys, defaults, return types)
//!     → ContractDecl::validate
//!     → ContractDescriptor (immutable, one per contract type)
//! ```
//!
//! # Design Decisions
//! - Reading the metadata is the declaring type's job; this module only
//!   checks it
//! - A contract type is identified by its `TypeId`
//! - Declaration errors are never cached: every lookup retries

pub mod decl;
mod macros;

pub use decl::{AccessorDecl, AccessorSpec, Contract, ContractDecl, ContractDescriptor, DeclarationError};
