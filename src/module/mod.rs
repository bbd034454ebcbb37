//! Capability synthesis.
//!
//! # Data Flow
//! ```text
//! ResolvedBinding ──► ModuleBuilder ──► BinaryModule ──► activate() ──► LoadedModule
//!                       (pool.rs,         (bytes)        (activator.rs)   (dispatch table)
//!                        format.rs)
//! ```
//!
//! # Design Decisions
//! - Every instance gets a freshly named internal type so repeated builds never collide
//! - The emitted bytes follow a JVM class file layout so dumps open in standard tools
//! - Instances are immutable; changing a value means building a new one
//! - `InstanceFactory` is the seam: the bytecode path and the direct table path
//!   produce the same `LoadedModule` shape

pub mod activator;
pub mod builder;
pub mod factory;
pub mod format;
pub mod instance;
pub mod pool;

use thiserror::Error;

use crate::codec::ScalarKind;

pub use activator::{activate, inspect, parse_module, ParsedModule};
pub use builder::{internal_name, BinaryModule, ModuleBuilder};
pub use factory::{BytecodeFactory, DispatchTableFactory, InstanceFactory};
pub use instance::{Capability, InstanceId, LoadedModule, Slot};

/// Errors while emitting a module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("constant pool needs {entries} entries, more than 16-bit indices allow")]
    PoolOverflow { entries: usize },

    #[error("text constant of {len} encoded bytes exceeds the 65535 byte limit")]
    TextTooLong { len: usize },

    #[error("constant {0:?} missing from the pool")]
    MissingConstant(String),

    #[error("{0} methods do not fit in one module")]
    TooManyMethods(usize),
}

/// Errors while activating a module.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActivationError {
    #[error("module truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("bad magic {0:#010x}")]
    BadMagic(u32),

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),

    #[error("unknown pool tag {tag} at offset {offset}")]
    UnknownTag { tag: u8, offset: usize },

    #[error("invalid modified UTF-8 at offset {offset}")]
    BadUtf8 { offset: usize },

    #[error("pool index {0} is out of range")]
    BadIndex(u16),

    #[error("pool index {index} is not a {expected} entry")]
    WrongEntry { index: u16, expected: &'static str },

    #[error("module implements {found:?}, expected {expected}")]
    InterfaceMismatch { expected: String, found: Option<String> },

    #[error("module has no initializer")]
    MissingInitializer,

    #[error("initializer method reference was never patched")]
    UnpatchedInitializer,

    #[error("unexpected initializer code {0:02x?}")]
    BadInitializer(Vec<u8>),

    #[error("method {method} has unsupported descriptor {descriptor}")]
    UnsupportedDescriptor { method: String, descriptor: String },

    #[error("method {method} has unsupported code {code:02x?}")]
    BadInstructions { method: String, code: Vec<u8> },

    #[error("method {method}: constant {raw} is out of range for {kind}")]
    ConstantOutOfRange {
        method: String,
        kind: ScalarKind,
        raw: i64,
    },

    #[error("method {method} returns {found}, contract declares {expected}")]
    KindMismatch {
        method: String,
        expected: ScalarKind,
        found: ScalarKind,
    },

    #[error("module lacks accessor {0}")]
    MissingAccessor(String),

    #[error("module defines accessor {0} the contract does not declare")]
    UnexpectedAccessor(String),

    #[error("{0} trailing bytes after module end")]
    TrailingBytes(usize),

    #[error("malformed module: {0}")]
    Malformed(String),
}

/// Anything that can go wrong turning a binding into an instance.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModuleError {
    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    #[error("activation failed: {0}")]
    Activation(#[from] ActivationError),
}
