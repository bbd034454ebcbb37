//! Contract declarations and their validation.

use std::collections::HashSet;
use thiserror::Error;

use crate::codec::ScalarKind;

/// Raw metadata for one accessor, as produced by the declaration step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessorDecl {
    pub name: String,
    pub key: Option<String>,
    pub default_value: Option<String>,
    /// Declared return type as written, e.g. `bool` or `String`.
    pub return_type: String,
    pub parameter_count: usize,
}

impl AccessorDecl {
    pub fn new(name: impl Into<String>, return_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: None,
            default_value: None,
            return_type: return_type.into(),
            parameter_count: 0,
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn parameters(mut self, count: usize) -> Self {
        self.parameter_count = count;
        self
    }
}

/// Raw metadata for a contract type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDecl {
    pub type_name: String,
    /// False when the type is not shaped like a capability contract.
    pub capability: bool,
    /// Configuration source locator; `None` when the type carries no source metadata.
    pub source: Option<String>,
    pub accessors: Vec<AccessorDecl>,
}

impl ContractDecl {
    /// Start a capability contract bound to a source locator.
    pub fn capability(type_name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            capability: true,
            source: Some(source.into()),
            accessors: Vec::new(),
        }
    }

    pub fn accessor(mut self, accessor: AccessorDecl) -> Self {
        self.accessors.push(accessor);
        self
    }

    /// Check the declaration and derive the immutable descriptor.
    pub fn validate(self) -> Result<ContractDescriptor, DeclarationError> {
        let contract = self.type_name;
        if !self.capability {
            return Err(DeclarationError::NotACapability { contract });
        }
        let Some(source_locator) = self.source else {
            return Err(DeclarationError::MissingSource { contract });
        };

        let mut seen = HashSet::new();
        let mut accessors = Vec::with_capacity(self.accessors.len());
        for decl in self.accessors {
            let accessor = decl.name;
            if !seen.insert(accessor.clone()) {
                return Err(DeclarationError::DuplicateAccessor { contract, accessor });
            }
            if decl.parameter_count != 0 {
                return Err(DeclarationError::HasParameters {
                    contract,
                    accessor,
                    count: decl.parameter_count,
                });
            }
            let Some(kind) = ScalarKind::from_type_name(&decl.return_type) else {
                return Err(DeclarationError::UnsupportedReturnType {
                    contract,
                    accessor,
                    return_type: decl.return_type,
                });
            };
            let Some(key) = decl.key else {
                return Err(DeclarationError::MissingAccessorMetadata {
                    contract,
                    accessor,
                    what: "configuration key",
                });
            };
            let Some(default_value) = decl.default_value else {
                return Err(DeclarationError::MissingAccessorMetadata {
                    contract,
                    accessor,
                    what: "default value",
                });
            };
            accessors.push(AccessorSpec {
                name: accessor,
                kind,
                key,
                default_value,
            });
        }

        Ok(ContractDescriptor {
            type_name: contract,
            source_locator,
            accessors,
        })
    }
}

/// A validated accessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessorSpec {
    pub name: String,
    pub kind: ScalarKind,
    pub key: String,
    pub default_value: String,
}

/// A validated contract. Created once per contract type and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDescriptor {
    pub type_name: String,
    pub source_locator: String,
    pub accessors: Vec<AccessorSpec>,
}

impl ContractDescriptor {
    pub fn accessor(&self, name: &str) -> Option<&AccessorSpec> {
        self.accessors.iter().find(|a| a.name == name)
    }
}

/// A Rust type that declares a configuration-backed capability.
///
/// Usually implemented through the [`contract!`](crate::contract!) macro.
/// Its `TypeId` is the cache key.
pub trait Contract: 'static {
    fn declaration() -> ContractDecl;
}

/// Errors in a contract's declaration. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    #[error("{contract} is not a capability contract")]
    NotACapability { contract: String },

    #[error("{contract} declares no configuration source")]
    MissingSource { contract: String },

    #[error("accessor {contract}::{accessor} has no {what} declared")]
    MissingAccessorMetadata {
        contract: String,
        accessor: String,
        what: &'static str,
    },

    #[error("accessor {contract}::{accessor} has parameters ({count})")]
    HasParameters {
        contract: String,
        accessor: String,
        count: usize,
    },

    #[error("accessor {contract}::{accessor} has wrong return type: {return_type}")]
    UnsupportedReturnType {
        contract: String,
        accessor: String,
        return_type: String,
    },

    #[error("accessor {contract}::{accessor} is declared more than once")]
    DuplicateAccessor { contract: String, accessor: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ContractDecl {
        ContractDecl::capability("Flags", "flags.properties")
            .accessor(AccessorDecl::new("flag", "bool").key("f").default_value("false"))
            .accessor(AccessorDecl::new("name", "String").key("n").default_value("x"))
    }

    #[test]
    fn test_validate_preserves_order() {
        let descriptor = valid().validate().unwrap();
        assert_eq!(descriptor.type_name, "Flags");
        assert_eq!(descriptor.source_locator, "flags.properties");
        let names: Vec<_> = descriptor.accessors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["flag", "name"]);
        assert_eq!(descriptor.accessor("flag").unwrap().kind, ScalarKind::Bool);
    }

    #[test]
    fn test_rejects_non_capability() {
        let mut decl = valid();
        decl.capability = false;
        assert!(matches!(decl.validate(), Err(DeclarationError::NotACapability { .. })));
    }

    #[test]
    fn test_rejects_missing_source() {
        let mut decl = valid();
        decl.source = None;
        assert!(matches!(decl.validate(), Err(DeclarationError::MissingSource { .. })));
    }

    #[test]
    fn test_rejects_parameters() {
        let decl = ContractDecl::capability("Bad", "x.properties").accessor(
            AccessorDecl::new("fail", "bool").key("k").default_value("false").parameters(1),
        );
        let err = decl.validate().unwrap_err();
        assert!(err.to_string().contains("has parameters"));
    }

    #[test]
    fn test_rejects_unsupported_kind() {
        let decl = ContractDecl::capability("Bad", "x.properties")
            .accessor(AccessorDecl::new("fail", "Option<bool>").key("k").default_value("false"));
        let err = decl.validate().unwrap_err();
        assert!(err.to_string().contains("wrong return type"));
    }

    #[test]
    fn test_string_aliases_in_hand_written_declarations() {
        for return_type in ["String", "str", "&str", "&'static str"] {
            let descriptor = ContractDecl::capability("Text", "x.properties")
                .accessor(AccessorDecl::new("text", return_type).key("t").default_value("x"))
                .validate()
                .unwrap();
            assert_eq!(descriptor.accessors[0].kind, ScalarKind::String, "{return_type}");
        }
    }

    #[test]
    fn test_rejects_missing_key() {
        let decl = ContractDecl::capability("Bad", "x.properties")
            .accessor(AccessorDecl::new("fail", "bool").default_value("false"));
        assert!(matches!(
            decl.validate(),
            Err(DeclarationError::MissingAccessorMetadata { what: "configuration key", .. })
        ));
    }

    #[test]
    fn test_rejects_duplicates() {
        let decl = valid().accessor(AccessorDecl::new("flag", "bool").key("g").default_value("true"));
        assert!(matches!(decl.validate(), Err(DeclarationError::DuplicateAccessor { .. })));
    }
}
