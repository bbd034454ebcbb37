//! Instance production behind a narrow seam.
//!
//! The cache only sees `InstanceFactory`. `BytecodeFactory` emits and
//! activates a binary module; `DispatchTableFactory` skips emission and builds
//! the table straight from the binding. Both yield the same `LoadedModule`.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::contract::ContractDescriptor;
use crate::module::builder::{internal_name, ModuleBuilder};
use crate::module::instance::{LoadedModule, Slot};
use crate::module::{activator, ModuleError};
use crate::resolver::ResolvedBinding;

/// Produces activated instances from resolved bindings.
pub trait InstanceFactory: Send + Sync {
    fn produce(
        &self,
        descriptor: &ContractDescriptor,
        binding: &ResolvedBinding,
    ) -> Result<Arc<LoadedModule>, ModuleError>;

    /// Short name for logs and metrics.
    fn name(&self) -> &'static str;
}

/// Emits a binary module per build and activates it.
#[derive(Debug, Default)]
pub struct BytecodeFactory {
    dump_dir: Option<PathBuf>,
    sequence: AtomicU64,
}

impl BytecodeFactory {
    pub fn new(dump_dir: Option<PathBuf>) -> Self {
        Self {
            dump_dir,
            sequence: AtomicU64::new(0),
        }
    }

    /// A type name no earlier build has used.
    fn fresh_type_name(&self, contract: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}$CG{}", internal_name(contract), seq)
    }

    fn dump(&self, type_name: &str, bytes: &[u8]) {
        let Some(dir) = &self.dump_dir else {
            return;
        };
        let path = dir.join(format!("{}.class", type_name.replace('/', ".")));
        match fs::create_dir_all(dir).and_then(|_| fs::write(&path, bytes)) {
            Ok(()) => tracing::debug!(path = ?path, bytes = bytes.len(), "Dumped module"),
            Err(e) => tracing::warn!(path = ?path, error = %e, "Failed to dump module"),
        }
    }
}

impl InstanceFactory for BytecodeFactory {
    fn produce(
        &self,
        descriptor: &ContractDescriptor,
        binding: &ResolvedBinding,
    ) -> Result<Arc<LoadedModule>, ModuleError> {
        let type_name = self.fresh_type_name(&descriptor.type_name);
        let module = binding
            .accessors
            .iter()
            .fold(
                ModuleBuilder::new(type_name.clone()).implements(internal_name(&descriptor.type_name)),
                |builder, accessor| builder.method(accessor.name.clone(), accessor.value.clone()),
            )
            .build()?;

        self.dump(&type_name, module.as_bytes());
        tracing::trace!(type_name = %type_name, bytes = module.as_bytes().len(), "Emitted module");

        let loaded = activator::activate(module, descriptor)?;
        Ok(Arc::new(loaded))
    }

    fn name(&self) -> &'static str {
        "bytecode"
    }
}

/// Builds the dispatch table directly from the binding.
#[derive(Debug, Default)]
pub struct DispatchTableFactory;

impl InstanceFactory for DispatchTableFactory {
    fn produce(
        &self,
        descriptor: &ContractDescriptor,
        binding: &ResolvedBinding,
    ) -> Result<Arc<LoadedModule>, ModuleError> {
        let slots = binding
            .accessors
            .iter()
            .map(|a| Slot {
                name: a.name.clone(),
                value: a.value.clone(),
            })
            .collect();
        Ok(Arc::new(LoadedModule::new(
            internal_name(&descriptor.type_name),
            descriptor.type_name.clone(),
            slots,
        )))
    }

    fn name(&self) -> &'static str {
        "dispatch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ScalarValue;
    use crate::contract::{AccessorDecl, ContractDecl};
    use crate::resolver::ResolvedAccessor;

    fn fixture() -> (ContractDescriptor, ResolvedBinding) {
        let descriptor = ContractDecl::capability("app::Limits", "limits.properties")
            .accessor(AccessorDecl::new("max", "i64").key("max").default_value("10"))
            .accessor(AccessorDecl::new("ratio", "f64").key("ratio").default_value("0.5"))
            .validate()
            .unwrap();
        let accessors = vec![
            ResolvedAccessor {
                name: "max".into(),
                kind: crate::codec::ScalarKind::Int64,
                key: "max".into(),
                text: "10".into(),
                value: ScalarValue::Int64(10),
                from_default: true,
            },
            ResolvedAccessor {
                name: "ratio".into(),
                kind: crate::codec::ScalarKind::Float64,
                key: "ratio".into(),
                text: "0.5".into(),
                value: ScalarValue::Float64(0.5),
                from_default: true,
            },
        ];
        let binding = ResolvedBinding {
            contract: "app::Limits".into(),
            fingerprint: "max=10\nratio=0.5\n".into(),
            accessors,
            source: None,
            watchable: false,
            warnings: Vec::new(),
        };
        (descriptor, binding)
    }

    #[test]
    fn test_factories_agree() {
        let (descriptor, binding) = fixture();
        let emitted = BytecodeFactory::default().produce(&descriptor, &binding).unwrap();
        let direct = DispatchTableFactory.produce(&descriptor, &binding).unwrap();
        assert_eq!(emitted.slots(), direct.slots());
        assert_eq!(emitted.contract(), direct.contract());
    }

    #[test]
    fn test_each_build_gets_a_fresh_type_name() {
        let (descriptor, binding) = fixture();
        let factory = BytecodeFactory::default();
        let a = factory.produce(&descriptor, &binding).unwrap();
        let b = factory.produce(&descriptor, &binding).unwrap();
        assert_eq!(a.type_name(), "app/Limits$CG1");
        assert_eq!(b.type_name(), "app/Limits$CG2");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_dump_dir_receives_module() {
        let tmp = tempfile::tempdir().unwrap();
        let (descriptor, binding) = fixture();
        let factory = BytecodeFactory::new(Some(tmp.path().join("dump")));
        factory.produce(&descriptor, &binding).unwrap();

        let dumped = tmp.path().join("dump").join("app.Limits$CG1.class");
        let bytes = fs::read(dumped).unwrap();
        assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
    }
}
