//! Contract resolution.
//!
//! # Data Flow
//! ```text
//! ContractDescriptor
//!     → LocatorResolver (indirection, base dir)   unresolved → warning, no source
//!     → WatchRegistry::register(file)             failure → warning
//!     → SourceReader::read                        missing/unreadable → warning, empty
//!     → per accessor: override or default → codec::convert
//!     → ResolvedBinding (values + fingerprint + warnings)
//! ```
//!
//! # Design Decisions
//! - Warnings never stop a build; conversion errors always do
//! - The fingerprint covers resolved text, so comment edits and unrelated
//!   keys leave it unchanged
//! - An empty override for a `char` accessor falls back to the default

mod binding;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::codec::{self, ConversionError, ScalarKind, ScalarValue};
use crate::contract::{AccessorSpec, ContractDescriptor, DeclarationError};
use crate::source::{Located, LocatorResolver, SourceError, SourceReader};
use crate::watch::WatchRegistry;

pub use binding::{ResolutionWarning, ResolvedAccessor, ResolvedBinding};

/// Fatal resolution failures. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    #[error("{contract}: key {key} has value {value:?} which is not a valid {kind} ({source})")]
    Conversion {
        contract: String,
        accessor: String,
        key: String,
        value: String,
        kind: ScalarKind,
        #[source]
        source: ConversionError,
    },
}

/// Produces bindings for contract descriptors.
pub struct ContractResolver {
    reader: Arc<dyn SourceReader>,
    locator: LocatorResolver,
    registry: Arc<WatchRegistry>,
}

impl ContractResolver {
    pub fn new(reader: Arc<dyn SourceReader>, locator: LocatorResolver, registry: Arc<WatchRegistry>) -> Self {
        Self {
            reader,
            locator,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<WatchRegistry> {
        &self.registry
    }

    /// Resolve every accessor of `descriptor` against its configuration source.
    pub fn resolve(&self, descriptor: &ContractDescriptor) -> Result<ResolvedBinding, ResolveError> {
        let mut warnings = Vec::new();
        let contract = descriptor.type_name.as_str();

        let (source, overrides) = match self.locator.resolve(&descriptor.source_locator) {
            Located::Path(path) => {
                if let Err(e) = self.registry.register(&path) {
                    warnings.push(ResolutionWarning::WatchFailed {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
                let overrides = self.read_source(&path, &mut warnings);
                (Some(path), overrides)
            }
            Located::Unresolved { variable } => {
                warnings.push(ResolutionWarning::UnresolvedVariable {
                    locator: descriptor.source_locator.clone(),
                    variable,
                });
                (None, HashMap::new())
            }
        };

        for warning in &warnings {
            tracing::warn!(contract = %contract, "{}", warning);
        }

        let accessors = descriptor
            .accessors
            .iter()
            .map(|spec| resolve_accessor(contract, spec, &overrides))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            contract = %contract,
            source = ?source,
            accessors = accessors.len(),
            overridden = accessors.iter().filter(|a| !a.from_default).count(),
            "Resolved contract"
        );

        Ok(ResolvedBinding {
            contract: contract.to_string(),
            fingerprint: binding::fingerprint(&accessors),
            accessors,
            watchable: source.is_some(),
            source,
            warnings,
        })
    }

    fn read_source(&self, path: &Path, warnings: &mut Vec<ResolutionWarning>) -> HashMap<String, String> {
        match self.reader.read(path) {
            Ok(map) => map,
            Err(SourceError::NotFound(path)) => {
                warnings.push(ResolutionWarning::MissingSource { path });
                HashMap::new()
            }
            Err(e @ SourceError::Io { .. }) => {
                warnings.push(ResolutionWarning::UnreadableSource {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
                HashMap::new()
            }
        }
    }
}

fn resolve_accessor(
    contract: &str,
    spec: &AccessorSpec,
    overrides: &HashMap<String, String>,
) -> Result<ResolvedAccessor, ResolveError> {
    let conversion_error = |text: &str, source: ConversionError| ResolveError::Conversion {
        contract: contract.to_string(),
        accessor: spec.name.clone(),
        key: spec.key.clone(),
        value: text.to_string(),
        kind: spec.kind,
        source,
    };

    let resolved = |text: &str, value: ScalarValue, from_default: bool| ResolvedAccessor {
        name: spec.name.clone(),
        kind: spec.kind,
        key: spec.key.clone(),
        text: text.to_string(),
        value,
        from_default,
    };

    match overrides.get(&spec.key) {
        Some(text) => match codec::convert(text, spec.kind) {
            Ok(value) => Ok(resolved(text, value, false)),
            Err(ConversionError::Absent { .. }) => codec::convert(&spec.default_value, spec.kind)
                .map(|value| resolved(&spec.default_value, value, true))
                .map_err(|e| conversion_error(&spec.default_value, e)),
            Err(e) => Err(conversion_error(text, e)),
        },
        None => codec::convert(&spec.default_value, spec.kind)
            .map(|value| resolved(&spec.default_value, value, true))
            .map_err(|e| conversion_error(&spec.default_value, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{AccessorDecl, ContractDecl};
    use crate::source::PropertiesReader;
    use std::fs;

    fn resolver(variables: HashMap<String, String>) -> ContractResolver {
        ContractResolver::new(
            Arc::new(PropertiesReader),
            LocatorResolver::new('@', variables, None),
            Arc::new(WatchRegistry::new()),
        )
    }

    fn flags(source: &str) -> ContractDescriptor {
        ContractDecl::capability("app::Flags", source)
            .accessor(AccessorDecl::new("flag", "bool").key("f").default_value("false"))
            .accessor(AccessorDecl::new("name", "String").key("n").default_value("anon"))
            .accessor(AccessorDecl::new("initial", "char").key("c").default_value("z"))
            .validate()
            .unwrap()
    }

    #[test]
    fn test_overrides_and_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("flags.properties");
        fs::write(&file, "# comment\nf=true\nunrelated=1\n").unwrap();

        let binding = resolver(HashMap::new())
            .resolve(&flags(file.to_str().unwrap()))
            .unwrap();
        assert_eq!(binding.value("flag"), Some(&ScalarValue::Bool(true)));
        assert_eq!(binding.value("name"), Some(&ScalarValue::String("anon".into())));
        assert_eq!(binding.fingerprint, "f=true\nn=anon\nc=z\n");
        assert!(binding.watchable);
        assert!(binding.warnings.is_empty());
        assert!(!binding.accessors[0].from_default);
        assert!(binding.accessors[1].from_default);
    }

    #[test]
    fn test_missing_source_warns_and_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("absent.properties");

        let binding = resolver(HashMap::new())
            .resolve(&flags(file.to_str().unwrap()))
            .unwrap();
        assert_eq!(binding.value("flag"), Some(&ScalarValue::Bool(false)));
        assert!(binding.watchable);
        assert!(matches!(
            binding.warnings.as_slice(),
            [ResolutionWarning::MissingSource { .. }]
        ));
    }

    #[test]
    fn test_unresolved_variable_is_not_watchable() {
        let binding = resolver(HashMap::new())
            .resolve(&flags("@CAPCONF_TEST_UNSET_VARIABLE@"))
            .unwrap();
        assert!(!binding.watchable);
        assert_eq!(binding.source, None);
        assert!(matches!(
            binding.warnings.as_slice(),
            [ResolutionWarning::UnresolvedVariable { variable, .. }] if variable == "CAPCONF_TEST_UNSET_VARIABLE"
        ));
    }

    #[test]
    fn test_variable_indirection() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("via-var.properties");
        fs::write(&file, "n=indirect\n").unwrap();
        let vars = HashMap::from([("FLAGS_FILE".to_string(), file.display().to_string())]);

        let binding = resolver(vars).resolve(&flags("@FLAGS_FILE@")).unwrap();
        assert_eq!(binding.value("name"), Some(&ScalarValue::String("indirect".into())));
        assert_eq!(binding.source.as_deref(), Some(file.as_path()));
    }

    #[test]
    fn test_conversion_error_names_key_value_and_kind() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("bad.properties");
        fs::write(&file, "f=perhaps\n").unwrap();

        let err = resolver(HashMap::new())
            .resolve(&flags(file.to_str().unwrap()))
            .unwrap_err();
        match &err {
            ResolveError::Conversion { contract, key, value, kind, .. } => {
                assert_eq!(contract, "app::Flags");
                assert_eq!(key, "f");
                assert_eq!(value, "perhaps");
                assert_eq!(*kind, ScalarKind::Bool);
            }
            other => panic!("unexpected error: {other}"),
        }
        let message = err.to_string();
        assert!(message.contains("app::Flags"));
        assert!(message.contains("perhaps"));
    }

    #[test]
    fn test_empty_char_override_falls_back_to_default() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("char.properties");
        fs::write(&file, "c=\n").unwrap();

        let binding = resolver(HashMap::new())
            .resolve(&flags(file.to_str().unwrap()))
            .unwrap();
        assert_eq!(binding.value("initial"), Some(&ScalarValue::Char('z')));
        assert!(binding.accessors[2].from_default);
    }

    #[test]
    fn test_empty_char_default_is_an_error() {
        let descriptor = ContractDecl::capability("app::Chars", "@CAPCONF_TEST_UNSET_VARIABLE@")
            .accessor(AccessorDecl::new("initial", "char").key("c").default_value(""))
            .validate()
            .unwrap();
        let err = resolver(HashMap::new()).resolve(&descriptor).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Conversion {
                source: ConversionError::Absent { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_fingerprint_ignores_comments_and_unrelated_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("fp.properties");
        let resolver = resolver(HashMap::new());
        let descriptor = flags(file.to_str().unwrap());

        fs::write(&file, "f=true\n").unwrap();
        let before = resolver.resolve(&descriptor).unwrap().fingerprint;
        fs::write(&file, "# touched\nf=true\nother=x\n").unwrap();
        let after = resolver.resolve(&descriptor).unwrap().fingerprint;
        assert_eq!(before, after);

        fs::write(&file, "f=false\n").unwrap();
        assert_ne!(before, resolver.resolve(&descriptor).unwrap().fingerprint);
    }

    #[test]
    fn test_registers_source_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("reg.properties");
        let resolver = resolver(HashMap::new());
        resolver.resolve(&flags(file.to_str().unwrap())).unwrap();

        let canonical = tmp.path().canonicalize().unwrap().join("reg.properties");
        assert!(resolver.registry().matches(&canonical));
    }
}
