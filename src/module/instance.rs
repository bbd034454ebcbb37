//! Activated instances.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::codec::{FromScalar, ScalarKind, ScalarValue};
use crate::contract::Contract;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity assigned at activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InstanceId(pub u64);

impl InstanceId {
    pub(crate) fn next() -> Self {
        Self(NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One accessor and the constant it returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot {
    pub name: String,
    pub value: ScalarValue,
}

/// A dispatch table: accessor name → precomputed constant.
#[derive(Debug, Serialize)]
pub struct LoadedModule {
    id: InstanceId,
    type_name: String,
    contract: String,
    slots: Vec<Slot>,
    #[serde(skip)]
    by_name: HashMap<String, usize>,
}

impl LoadedModule {
    /// Slots must already be unique by name.
    pub(crate) fn new(type_name: String, contract: String, slots: Vec<Slot>) -> Self {
        let by_name = slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (slot.name.clone(), i))
            .collect();
        Self {
            id: InstanceId::next(),
            type_name,
            contract,
            slots,
            by_name,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Internal type name the instance was built under.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn value(&self, name: &str) -> Option<&ScalarValue> {
        self.by_name.get(name).map(|&i| &self.slots[i].value)
    }

    pub fn kind(&self, name: &str) -> Option<ScalarKind> {
        self.value(name).map(ScalarValue::kind)
    }
}

/// A typed, cheaply clonable handle to an activated contract instance.
pub struct Capability<C: Contract> {
    module: Arc<LoadedModule>,
    _contract: PhantomData<fn() -> C>,
}

impl<C: Contract> Capability<C> {
    pub(crate) fn new(module: Arc<LoadedModule>) -> Self {
        Self {
            module,
            _contract: PhantomData,
        }
    }

    /// True when both handles point at the same activated instance.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.module, &b.module)
    }

    pub fn id(&self) -> InstanceId {
        self.module.id()
    }

    pub fn module(&self) -> &LoadedModule {
        &self.module
    }

    /// Read an accessor's constant, if it exists with kind `T`.
    pub fn get<T: FromScalar>(&self, name: &str) -> Option<T> {
        self.module.value(name).and_then(T::from_scalar)
    }

    /// Read an accessor whose kind was checked at activation.
    ///
    /// Used by `contract!`-generated accessors.
    pub fn value<T: FromScalar>(&self, name: &str) -> T {
        match self.get::<T>(name) {
            Some(value) => value,
            None => {
                debug_assert!(false, "accessor {name} missing or not {}", T::KIND);
                tracing::error!(
                    contract = %self.module.contract(),
                    accessor = %name,
                    expected = %T::KIND,
                    "Accessor missing from instance, returning default"
                );
                T::default()
            }
        }
    }
}

impl<C: Contract> Clone for Capability<C> {
    fn clone(&self) -> Self {
        Self::new(self.module.clone())
    }
}

impl<C: Contract> fmt::Debug for Capability<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("id", &self.module.id())
            .field("type_name", &self.module.type_name())
            .field("slots", &self.module.slots())
            .finish()
    }
}
