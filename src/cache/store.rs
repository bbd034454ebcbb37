//! The reload cache.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cache::entry::CacheEntry;
use crate::contract::{ContractDecl, ContractDescriptor};
use crate::error::{Error, Result};
use crate::module::{InstanceFactory, LoadedModule};
use crate::observability::metrics::{outcome, Metrics};
use crate::resolver::{ContractResolver, ResolveError};
use crate::watch::Reload;

/// What one reload pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadReport {
    /// Fingerprint unchanged; the instance was kept.
    pub reused: usize,
    /// Fingerprint changed; a new instance was installed.
    pub replaced: usize,
    /// The entry was invalidated or replaced while the pass ran.
    pub skipped: usize,
    /// Resolution or production failed; the old instance stays.
    pub failed: usize,
}

enum ReloadOutcome {
    Reused,
    Replaced,
    Skipped,
}

/// One instance per contract type, rebuilt only when its resolved values change.
pub struct ReloadCache {
    entries: DashMap<TypeId, Arc<CacheEntry>>,
    resolver: ContractResolver,
    factory: Arc<dyn InstanceFactory>,
    metrics: Metrics,
    passes: AtomicU64,
}

impl ReloadCache {
    pub fn new(resolver: ContractResolver, factory: Arc<dyn InstanceFactory>) -> Self {
        Self {
            entries: DashMap::new(),
            resolver,
            factory,
            metrics: Metrics::default(),
            passes: AtomicU64::new(0),
        }
    }

    /// Replace the default (enabled) metrics switch.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn resolver(&self) -> &ContractResolver {
        &self.resolver
    }

    /// Current instance for `type_id`, building it on first use.
    ///
    /// Racing first builds all run; the first to install wins and the others
    /// return the winner's instance.
    pub fn get(&self, type_id: TypeId, declare: impl FnOnce() -> ContractDecl) -> Result<Arc<LoadedModule>> {
        if let Some(entry) = self.entries.get(&type_id) {
            return Ok(entry.instance.clone());
        }

        let decl = declare();
        let type_name = decl.type_name.clone();
        let descriptor = decl.validate().map_err(|e| {
            self.metrics.record_build(&type_name, outcome::DECLARATION_ERROR);
            e
        })?;
        let built = Arc::new(self.build(Arc::new(descriptor))?);

        let installed = match self.entries.entry(type_id) {
            Entry::Occupied(existing) => {
                tracing::debug!(
                    contract = %built.contract(),
                    discarded = %built.instance.id(),
                    kept = %existing.get().instance.id(),
                    "Lost first-build race"
                );
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                slot.insert(built.clone());
                tracing::info!(
                    contract = %built.contract(),
                    instance = %built.instance.id(),
                    factory = self.factory.name(),
                    watchable = built.watchable,
                    "Installed contract instance"
                );
                built
            }
        };
        self.metrics.record_cache_size(self.entries.len());
        Ok(installed.instance.clone())
    }

    /// Resolve and produce a fresh entry.
    fn build(&self, descriptor: Arc<ContractDescriptor>) -> Result<CacheEntry> {
        let contract = descriptor.type_name.as_str();
        let binding = self.resolver.resolve(&descriptor).map_err(|e| {
            let label = match &e {
                ResolveError::Declaration(_) => outcome::DECLARATION_ERROR,
                ResolveError::Conversion { .. } => outcome::CONVERSION_ERROR,
            };
            self.metrics.record_build(contract, label);
            Error::from(e)
        })?;
        let instance = self.factory.produce(&descriptor, &binding).map_err(|e| {
            self.metrics.record_build(contract, outcome::MODULE_ERROR);
            Error::from(e)
        })?;
        self.metrics.record_build(contract, outcome::BUILT);
        Ok(CacheEntry::new(descriptor.clone(), instance, binding))
    }

    /// Re-check every watchable entry and replace those whose values changed.
    ///
    /// Works from a snapshot; a failure on one contract is logged and the
    /// pass moves on.
    pub fn reload_all(&self) -> ReloadReport {
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_reload_pass();

        let snapshot: Vec<(TypeId, Arc<CacheEntry>)> = self
            .entries
            .iter()
            .filter(|e| e.value().watchable)
            .map(|e| (*e.key(), e.value().clone()))
            .collect();

        let mut report = ReloadReport::default();
        for (type_id, current) in snapshot {
            match self.reload_one(type_id, &current) {
                Ok(ReloadOutcome::Reused) => report.reused += 1,
                Ok(ReloadOutcome::Replaced) => report.replaced += 1,
                Ok(ReloadOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    self.metrics.record_reload_error(current.contract());
                    tracing::error!(
                        contract = %current.contract(),
                        error = %e,
                        "Reload failed, keeping current instance"
                    );
                }
            }
        }

        tracing::debug!(
            reused = report.reused,
            replaced = report.replaced,
            skipped = report.skipped,
            failed = report.failed,
            "Reload pass complete"
        );
        report
    }

    fn reload_one(&self, type_id: TypeId, current: &Arc<CacheEntry>) -> Result<ReloadOutcome> {
        let binding = self.resolver.resolve(&current.descriptor)?;
        if binding.fingerprint == current.fingerprint {
            self.metrics.record_reuse(current.contract());
            return Ok(ReloadOutcome::Reused);
        }

        let instance = self.factory.produce(&current.descriptor, &binding)?;
        let replacement = Arc::new(CacheEntry::new(current.descriptor.clone(), instance, binding));

        // Only swap the entry this pass looked at.
        match self.entries.get_mut(&type_id) {
            Some(mut slot) if Arc::ptr_eq(&*slot, current) => {
                tracing::info!(
                    contract = %current.contract(),
                    old = %current.instance.id(),
                    new = %replacement.instance.id(),
                    "Configuration changed, instance replaced"
                );
                self.metrics.record_build(current.contract(), outcome::REPLACED);
                *slot = replacement;
                Ok(ReloadOutcome::Replaced)
            }
            _ => Ok(ReloadOutcome::Skipped),
        }
    }

    /// Drop the entry so the next `get` rebuilds. Returns whether one existed.
    pub fn invalidate(&self, type_id: TypeId) -> bool {
        let removed = self.entries.remove(&type_id);
        if let Some((_, entry)) = &removed {
            tracing::info!(contract = %entry.contract(), "Contract invalidated");
            self.metrics.record_cache_size(self.entries.len());
        }
        removed.is_some()
    }

    pub fn entry(&self, type_id: TypeId) -> Option<Arc<CacheEntry>> {
        self.entries.get(&type_id).map(|e| e.value().clone())
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.metrics.record_cache_size(0);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reload passes run so far.
    pub fn reload_passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }
}

impl Reload for ReloadCache {
    fn reload_all(&self) {
        ReloadCache::reload_all(self);
    }
}
